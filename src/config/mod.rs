//! Configuration types and path resolution for ember.
//!
//! Ember stores its settings as TOML at the platform's XDG config path
//! (e.g. `~/.config/ember/config.toml` on Linux), overlaid by a per-project
//! `ember.toml`, a `.mcp.json` server list, environment variables, and
//! finally command-line flags.

mod loader;
mod paths;
mod resolve;
mod types;

pub use types::{Config, McpServerConfig};

use anyhow::Result;
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load config with precedence: environment > project > global > defaults.
    /// Creates the global config file if none exists. CLI flags are applied
    /// afterwards with [`Config::apply_overrides`].
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let global = Self::load_global()?;
        Self::load_layered(global, &cwd, resolve::env_lookup)
    }

    fn load_layered(
        global: Config,
        cwd: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = global;
        if let Some(project) = Self::load_project(cwd)? {
            debug!("Applying project config");
            config = Self::merge(config, project);
        }

        // Servers named in the TOML files win over `.mcp.json`.
        for (name, server) in Self::load_mcp_json(cwd)? {
            config.mcp_servers.entry(name).or_insert(server);
        }

        config.resolve_substitutions(&lookup);
        config.apply_env(lookup);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn test_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("ember_test_config_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn creates_default_global_config() {
        let dir = test_dir("global");
        let path = dir.join("nested/config.toml");

        let config = Config::load_global_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, Config::default());

        // Second load reads the file it wrote.
        assert_eq!(Config::load_global_from(&path).unwrap(), config);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn project_file_found_by_walking_up() {
        let dir = test_dir("walk");
        fs::create_dir_all(dir.join(".git")).unwrap();
        fs::create_dir_all(dir.join("crates/inner")).unwrap();
        fs::write(dir.join("ember.toml"), "model = \"qwen3\"\nmax_rounds = 5\n").unwrap();

        let project = Config::load_project(&dir.join("crates/inner")).unwrap().unwrap();
        assert_eq!(project.model, "qwen3");
        assert_eq!(project.max_rounds, Some(5));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn project_search_stops_at_git_root() {
        let dir = test_dir("gitroot");
        fs::create_dir_all(dir.join("repo/.git")).unwrap();
        fs::write(dir.join("ember.toml"), "model = \"outside\"\n").unwrap();

        assert!(Config::load_project(&dir.join("repo")).unwrap().is_none());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn project_overrides_global() {
        let global = Config {
            host: "global:11434".into(),
            model: "global-model".into(),
            shell: Some("/bin/bash".into()),
            system_prompt: Some("Global prompt.".into()),
            ..Config::default()
        };
        let project: Config = toml::from_str("model = \"project-model\"\nmode = \"read\"\n").unwrap();

        let merged = Config::merge(global, project);
        assert_eq!(merged.host, "global:11434");
        assert_eq!(merged.model, "project-model");
        assert_eq!(merged.mode, "read");
        assert_eq!(merged.shell.as_deref(), Some("/bin/bash"));
        assert_eq!(merged.system_prompt.as_deref(), Some("Global prompt."));
    }

    #[test]
    fn mcp_json_accepts_both_shapes() {
        let dir = test_dir("mcp");
        fs::write(
            dir.join(".mcp.json"),
            r#"{"mcpServers": {"files": {"command": "files-server", "args": ["--stdio"]}}}"#,
        )
        .unwrap();
        let servers = Config::load_mcp_json(&dir).unwrap();
        assert_eq!(servers["files"].command, "files-server");
        assert_eq!(servers["files"].args, vec!["--stdio"]);

        fs::write(dir.join(".mcp.json"), r#"{"git": {"command": "git-server"}}"#).unwrap();
        let servers = Config::load_mcp_json(&dir).unwrap();
        assert_eq!(servers["git"].command, "git-server");
        assert!(servers["git"].env.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn layered_load_combines_sources() {
        let dir = test_dir("layered");
        fs::create_dir_all(dir.join(".git")).unwrap();
        fs::write(
            dir.join("ember.toml"),
            "[mcp_servers.files]\ncommand = \"toml-files\"\n",
        )
        .unwrap();
        fs::write(
            dir.join(".mcp.json"),
            r#"{"files": {"command": "json-files"}, "web": {"command": "web-server"}}"#,
        )
        .unwrap();

        let config = Config::load_layered(Config::default(), &dir, no_env).unwrap();
        assert_eq!(config.mcp_servers["files"].command, "toml-files");
        assert_eq!(config.mcp_servers["web"].command, "web-server");

        let config = Config::load_layered(Config::default(), &dir, |name| {
            (name == "OLLAMA_MODEL").then(|| "env-model".to_string())
        })
        .unwrap();
        assert_eq!(config.model, "env-model");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = test_dir("invalid");
        fs::create_dir_all(dir.join(".git")).unwrap();
        fs::write(dir.join("ember.toml"), "model = [").unwrap();
        assert!(Config::load_project(&dir).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
