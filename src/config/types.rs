//! Struct definitions and serde defaults for ember configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_HOST, DEFAULT_MODE, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};

/// Root configuration for ember, deserialized from `config.toml`.
///
/// Fields use serde defaults so ember can run with sensible defaults
/// when no config file exists.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Backend host, with or without scheme and path (e.g. `"localhost:11434"`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token for hosted backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Capability mode: `auto`, `build`, `none`, or a list like `read,execute`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Base system prompt; the mode-specific line is appended to it.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
    /// Chat rounds allowed per turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
    /// Shell used by the bash tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Delegated tool servers, keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

/// How to start one tool server.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

pub(super) fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

pub(super) fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

pub(super) fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

pub(super) fn default_system_prompt() -> Option<String> {
    Some(DEFAULT_SYSTEM_PROMPT.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            auth_token: None,
            mode: default_mode(),
            system_prompt: default_system_prompt(),
            max_rounds: None,
            shell: None,
            mcp_servers: BTreeMap::new(),
        }
    }
}
