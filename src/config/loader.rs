//! File loading and merging for ember configuration.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::{
    default_host, default_mode, default_model, default_system_prompt, Config, McpServerConfig,
};
use crate::constants::{MCP_CONFIG_FILENAME, PROJECT_CONFIG_FILENAME};

impl Config {
    /// Loads the global config from `~/.config/ember/config.toml`, creating
    /// it with defaults when missing.
    pub(super) fn load_global() -> Result<Self> {
        Self::load_global_from(&Self::config_path()?)
    }

    pub(super) fn load_global_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_toml = format!(
                r#"host = "{}"
model = "{}"
mode = "{}"
# auth_token = "{{env:EMBER_TOKEN}}"

# [mcp_servers.example]
# command = "example-tool-server"
# args = ["--stdio"]
"#,
                default_host(),
                default_model(),
                default_mode()
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let config: Config = toml::from_str(&default_toml)
                .with_context(|| "Failed to parse default config".to_string())?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }

    /// Look for ember.toml in `start`, then walk up to the git root.
    pub(super) fn load_project(start: &Path) -> Result<Option<Config>> {
        let Some(path) = find_project_file(start) else {
            return Ok(None);
        };
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read project config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse project config at {:?}", path))?;
        Ok(Some(config))
    }

    /// Servers declared in `.mcp.json` in `dir`. Accepts a bare
    /// `{name: server}` map or the `{"mcpServers": {...}}` form.
    pub(super) fn load_mcp_json(dir: &Path) -> Result<BTreeMap<String, McpServerConfig>> {
        let path = dir.join(MCP_CONFIG_FILENAME);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let mut value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        if let Some(servers) = value.get_mut("mcpServers") {
            value = servers.take();
        }
        serde_json::from_value(value)
            .with_context(|| format!("Invalid server definitions in {:?}", path))
    }

    /// Merge project config over global config.
    /// Project values win when present.
    pub(super) fn merge(global: Config, project: Config) -> Config {
        let mut mcp_servers = global.mcp_servers;
        mcp_servers.extend(project.mcp_servers);
        Config {
            host: if project.host != default_host() {
                project.host
            } else {
                global.host
            },
            model: if project.model != default_model() {
                project.model
            } else {
                global.model
            },
            mode: if project.mode != default_mode() {
                project.mode
            } else {
                global.mode
            },
            auth_token: project.auth_token.or(global.auth_token),
            system_prompt: if project.system_prompt != default_system_prompt() {
                project.system_prompt
            } else {
                global.system_prompt
            },
            max_rounds: project.max_rounds.or(global.max_rounds),
            shell: project.shell.or(global.shell),
            mcp_servers,
        }
    }
}

fn find_project_file(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(PROJECT_CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        // Stop at git root or filesystem root
        if dir.join(".git").exists() || !dir.pop() {
            return None;
        }
    }
}
