//! Interactive chat REPL for ember.
//!
//! Provides a multi-turn conversation loop using [`rustyline`] for readline
//! support (history, line editing). Each line is handed to the
//! [`TurnEngine`], which owns the conversation for the whole session.

mod commands;
mod signals;

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::TERMINATED_EXIT_CODE;
use crate::conversation::Conversation;
use crate::engine::{TurnEngine, TurnOutcome};
use crate::mcp::{self, SharedClient};
use crate::output::StdoutRenderer;
use crate::provider::StreamingChatClient;
use crate::shell::{ConsoleSink, ShellExecutor};
use crate::tools::ToolRegistry;

use commands::CommandAction;
use signals::{Interrupt, Signals};

/// Built-in tools for the working directory plus every configured tool
/// server. The returned clients must be shut down with
/// [`mcp::shutdown_all`].
pub async fn build_tools(config: &Config) -> Result<(ToolRegistry, Vec<SharedClient>)> {
    let project_root = std::env::current_dir()?;
    let shell = ShellExecutor::new(config.shell.clone(), Arc::new(ConsoleSink));
    let mut registry = ToolRegistry::with_builtins(project_root, shell);
    let clients = mcp::connect_all(&config.mcp_servers, &mut registry).await;
    debug!(tools = registry.len(), servers = clients.len(), "Tool registry ready");
    Ok((registry, clients))
}

/// How the REPL ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// The user left.
    Finished,
    /// SIGTERM arrived.
    Terminated,
}

/// Runs the interactive chat REPL.
///
/// # Readline behavior
///
/// - **Ctrl+C**: cancels current input, stays in REPL; during a turn it
///   cancels the turn
/// - **Ctrl+D**: exits cleanly with "goodbye."
/// - **SIGTERM**: ends the session after shutting down tool servers
/// - Readline history is persisted to `~/.cache/ember/chat_history.txt`
pub async fn run_chat(config: Config) -> Result<()> {
    let mode = config.capability_mode()?;
    let client = StreamingChatClient::new(&config.host, &config.model, config.auth_token.clone())
        .context("Failed to build HTTP client")?;
    let mut signals = Signals::install()?;
    println!(
        "{} [model: {}] [endpoint: {}] [mode: {}] (Ctrl+D to exit)",
        "ember".bold().cyan(),
        client.model().yellow(),
        client.endpoint().dimmed(),
        mode.to_string().yellow(),
    );
    println!();

    let (registry, clients) = build_tools(&config).await?;
    let mut engine = TurnEngine::new(
        Box::new(client),
        registry,
        Conversation::new(config.system_prompt()),
        mode,
    )
    .with_max_rounds(config.max_rounds());

    let result = repl(&mut engine, &mut signals).await;
    mcp::shutdown_all(&clients).await;
    match result? {
        SessionEnd::Finished => Ok(()),
        SessionEnd::Terminated => {
            info!("Terminated by SIGTERM");
            // A readline still blocked on the terminal would hold the runtime open.
            std::process::exit(TERMINATED_EXIT_CODE);
        }
    }
}

async fn repl(engine: &mut TurnEngine, signals: &mut Signals) -> Result<SessionEnd> {
    // Set up readline with persistent history
    let mut rl = DefaultEditor::new()?;
    let history_path = Config::history_path()?;
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    let end = loop {
        // Read on the blocking pool so signals are still handled while idle.
        let prompt = format!("{} ", ">".green().bold());
        let mut reading = tokio::task::spawn_blocking(move || {
            let line = rl.readline(&prompt);
            (rl, line)
        });
        let (editor, readline) = loop {
            tokio::select! {
                joined = &mut reading => break joined?,
                interrupt = signals.recv() => {
                    if interrupt == Interrupt::Terminate {
                        return Ok(SessionEnd::Terminated);
                    }
                }
            }
        };
        rl = editor;

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if commands::is_exit_word(&line) {
                    println!("{}", "goodbye.".dimmed());
                    break SessionEnd::Finished;
                }

                // Slash commands
                if line.starts_with('/') {
                    match commands::handle_slash_command(&line, engine)? {
                        CommandAction::Continue => continue,
                        CommandAction::Exit => {
                            println!("{}", "goodbye.".dimmed());
                            break SessionEnd::Finished;
                        }
                        CommandAction::Unknown(cmd) => {
                            println!("{} Unknown command: {}", "?".yellow(), cmd);
                            continue;
                        }
                    }
                }

                println!();
                let mut renderer = StdoutRenderer::new();
                let interrupted = tokio::select! {
                    outcome = engine.submit(&line, &mut renderer) => {
                        match outcome {
                            TurnOutcome::Finished { rounds, reason } => {
                                info!(rounds, reason = %reason, "Turn finished");
                            }
                            TurnOutcome::RoundLimit => info!("Turn stopped at round limit"),
                            // Already shown by the renderer.
                            TurnOutcome::Failed(_) | TurnOutcome::Empty => {}
                        }
                        None
                    }
                    interrupt = signals.recv() => Some(interrupt),
                };
                match interrupted {
                    Some(Interrupt::Cancel) => engine.cancel(&mut renderer),
                    Some(Interrupt::Terminate) => {
                        engine.cancel(&mut renderer);
                        break SessionEnd::Terminated;
                    }
                    None => {}
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "goodbye.".dimmed());
                break SessionEnd::Finished;
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break SessionEnd::Finished;
            }
        }
    };

    // Save readline history
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(err) = rl.save_history(&history_path) {
        warn!(error = %err, "Failed to save readline history");
    }
    debug!(end = ?end, "REPL finished");

    Ok(end)
}
