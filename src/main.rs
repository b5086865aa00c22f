//! Entry point for ember, a terminal agent that drives a streaming chat model
//! through tool-calling turns.
//!
//! This binary loads environment variables, sets up file logging, parses CLI
//! arguments via [`cli`], and dispatches to the chosen subcommand.

mod chat;
mod cli;
mod config;
mod constants;
mod conversation;
mod engine;
mod error;
mod logging;
mod mcp;
mod message;
mod mode;
mod output;
mod provider;
mod shell;
mod tools;

use anyhow::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let log_file = logging::init();
    tracing::debug!(log_file = ?log_file, version = constants::APP_VERSION, "ember starting");
    let cli = cli::parse();
    cli::run(cli).await
}
