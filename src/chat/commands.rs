//! Slash command handlers for the chat REPL.
//!
//! Dispatches `/clear`, `/mode`, `/tools`, `/dump`, `/help` and `/exit`.
//! Returns a [`CommandAction`] so the REPL loop can decide how to proceed.

use anyhow::Result;
use colored::Colorize;

use crate::engine::TurnEngine;
use crate::mode::CapabilityMode;

/// Action returned by slash command handling.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CommandAction {
    /// Command was handled; continue the REPL loop.
    Continue,
    /// Leave the REPL.
    Exit,
    /// Unknown command was entered.
    Unknown(String),
}

/// Bare words that end the session without a slash.
pub(crate) fn is_exit_word(line: &str) -> bool {
    matches!(line, "exit" | "quit")
}

/// Dispatch and handle a slash command.
pub(crate) fn handle_slash_command(command: &str, engine: &mut TurnEngine) -> Result<CommandAction> {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "/clear" => {
            engine.conversation_mut().clear();
            println!("{}", "Conversation cleared.".dimmed());
        }
        "/mode" => {
            if arg.is_empty() {
                println!("{} {}", "mode:".bold(), engine.mode().to_string().cyan());
            } else {
                match arg.parse::<CapabilityMode>() {
                    Ok(mode) => {
                        engine.set_mode(mode);
                        println!("{} {}", "mode:".bold(), engine.mode().to_string().cyan());
                    }
                    Err(err) => eprintln!("{} {}", "error:".red().bold(), err),
                }
            }
        }
        "/tools" => {
            let banner = engine.tools().banner(engine.mode());
            if banner.is_empty() {
                println!("{}", "No tools available in this mode.".dimmed());
            } else {
                println!("{banner}");
            }
        }
        "/dump" => {
            println!("{}", engine.conversation().dump(engine.mode())?);
        }
        "/help" => {
            println!("{}", "Commands:".bold());
            println!("  {} - clear the conversation", "/clear".cyan());
            println!(
                "  {} - show or set the capability mode (auto, build, none, read,write,execute)",
                "/mode [spec]".cyan()
            );
            println!("  {} - list tools available in this mode", "/tools".cyan());
            println!("  {} - print the conversation as sent", "/dump".cyan());
            println!("  {} - show this help", "/help".cyan());
            println!("  {} - exit", "/exit, Ctrl+D".cyan());
        }
        "/exit" | "/quit" => return Ok(CommandAction::Exit),
        _ => return Ok(CommandAction::Unknown(command.to_string())),
    }
    Ok(CommandAction::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;
    use crate::error::ChatError;
    use crate::message::{Message, Role};
    use crate::mode::Capability;
    use crate::provider::{ChatBackend, DeltaStream};
    use crate::tools::{ToolDescriptor, ToolRegistry};

    struct Offline;

    #[async_trait::async_trait]
    impl ChatBackend for Offline {
        async fn chat(&self, _: &[Message], _: &[ToolDescriptor]) -> Result<DeltaStream, ChatError> {
            Err(ChatError::Transport("offline".into()))
        }
    }

    fn engine() -> TurnEngine {
        TurnEngine::new(
            Box::new(Offline),
            ToolRegistry::new(),
            Conversation::new("sys"),
            CapabilityMode::all(),
        )
    }

    #[test]
    fn mode_command_switches_mode() {
        let mut engine = engine();
        assert_eq!(
            handle_slash_command("/mode read", &mut engine).unwrap(),
            CommandAction::Continue
        );
        assert_eq!(engine.mode(), &CapabilityMode::new([Capability::Read]));

        // Invalid specs leave the mode alone.
        handle_slash_command("/mode fly", &mut engine).unwrap();
        assert_eq!(engine.mode(), &CapabilityMode::new([Capability::Read]));
    }

    #[test]
    fn clear_keeps_system_message() {
        let mut engine = engine();
        engine.conversation_mut().add(Role::User, "hello");
        handle_slash_command("/clear", &mut engine).unwrap();
        assert_eq!(engine.conversation().len(), 1);
    }

    #[test]
    fn exit_and_unknown() {
        let mut engine = engine();
        assert_eq!(
            handle_slash_command("/exit", &mut engine).unwrap(),
            CommandAction::Exit
        );
        assert_eq!(
            handle_slash_command("/bogus arg", &mut engine).unwrap(),
            CommandAction::Unknown("/bogus arg".into())
        );
        assert!(is_exit_word("quit"));
        assert!(!is_exit_word("quitting"));
    }
}
