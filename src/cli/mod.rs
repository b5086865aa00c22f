//! Command-line interface definition and dispatch for ember.
//!
//! Uses [`clap`] for argument parsing with derive macros. With no subcommand
//! ember starts the chat REPL.

use crate::{chat, config::Config, mcp};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

/// Top-level CLI structure for ember.
#[derive(Parser, Debug)]
#[command(name = "ember", version, about = "A terminal agent for local and hosted chat models")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Flags that override the loaded configuration.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Backend host, e.g. `localhost:11434` or a full chat URL
    #[arg(long, global = true)]
    pub host: Option<String>,
    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,
    /// Capability mode: auto, build, none, or a list like read,execute
    #[arg(long, global = true)]
    pub mode: Option<String>,
}

/// Available subcommands for the ember CLI.
///
/// The `///` doc comments on variants double as `--help` text rendered by clap.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session (default)
    Chat,
    /// List the tools available in the configured mode
    Tools,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    let Overrides { host, model, mode } = cli.overrides;
    config.apply_overrides(host, model, mode);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat::run_chat(config).await,
        Commands::Tools => {
            let mode = config.capability_mode()?;
            let (registry, clients) = chat::build_tools(&config).await?;
            println!("{} {}", "mode:".bold(), mode.to_string().cyan());
            let banner = registry.banner(&mode);
            if banner.is_empty() {
                println!("{}", "No tools available in this mode.".dimmed());
            } else {
                println!("{banner}");
            }
            mcp::shutdown_all(&clients).await;
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let path = Config::config_path()?;
                println!("{} {}", "Config path:".bold(), path.display());
                println!();
                if config.auth_token.is_some() {
                    config.auth_token = Some("********".into());
                }
                let toml_str = toml::to_string_pretty(&config)?;
                println!("{}", toml_str);
                Ok(())
            }
        },
    }
}
