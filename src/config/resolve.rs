//! Environment variable substitution, overrides, and derived settings.

use anyhow::{anyhow, Result};

use super::types::Config;
use crate::constants::{
    DEFAULT_MAX_ROUNDS, DEFAULT_SYSTEM_PROMPT, ENV_HOST, ENV_MODE, ENV_MODEL, ENV_TOKEN,
};
use crate::mode::CapabilityMode;

/// Reads the process environment; empty values count as unset.
pub(super) fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Resolve {env:VAR_NAME} patterns in string fields.
    pub(super) fn resolve_substitutions(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        self.host = resolve_str(&self.host, lookup);
        self.model = resolve_str(&self.model, lookup);
        self.mode = resolve_str(&self.mode, lookup);
        for field in [&mut self.auth_token, &mut self.system_prompt, &mut self.shell] {
            if let Some(value) = field {
                *value = resolve_str(value, lookup);
            }
        }
        for server in self.mcp_servers.values_mut() {
            server.command = resolve_str(&server.command, lookup);
            for arg in &mut server.args {
                *arg = resolve_str(arg, lookup);
            }
            for value in server.env.values_mut() {
                *value = resolve_str(value, lookup);
            }
        }
        // A token that resolved to nothing is no token.
        if self.auth_token.as_deref() == Some("") {
            self.auth_token = None;
        }
    }

    /// Environment overrides: `OLLAMA_HOST`, `OLLAMA_MODEL`, `EMBER_TOKEN`,
    /// `EMBER_MODE`.
    pub(super) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model = model;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.auth_token = Some(token);
        }
        if let Some(mode) = lookup(ENV_MODE) {
            self.mode = mode;
        }
    }

    /// Command-line flags, which beat everything else.
    pub fn apply_overrides(
        &mut self,
        host: Option<String>,
        model: Option<String>,
        mode: Option<String>,
    ) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }
    }

    pub fn capability_mode(&self) -> Result<CapabilityMode> {
        self.mode
            .parse()
            .map_err(|err| anyhow!("Invalid mode {:?} in config: {err}", self.mode))
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

/// Replace {env:VAR} with the variable's value, or nothing when unset.
fn resolve_str(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("{env:") {
        let start = from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 5..start + end];
        let value = lookup(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        // Substituted text is never re-scanned.
        from = start + value.len();
    }
    result
}
