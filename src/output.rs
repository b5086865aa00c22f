//! Output rendering abstraction for ember.
//!
//! Defines the [`Renderer`] trait that decouples the turn engine from the
//! terminal. [`StdoutRenderer`] prints straight to the console; tests use a
//! recording double.

use colored::Colorize;
use std::io::{self, Write};

use crate::engine::State;
use crate::message::ToolCall;
use crate::tools::ToolResult;

/// Clears the current terminal line.
const CLEAR_LINE: &str = "\r\x1b[2K";

pub trait Renderer {
    /// Called on every state transition.
    fn progress(&mut self, state: &State);

    /// A reasoning fragment. Shown, never stored.
    fn render_reasoning(&mut self, text: &str);

    /// A content fragment as it arrives.
    fn render_token(&mut self, token: &str);

    /// About to run a tool call.
    fn render_tool_call(&mut self, call: &ToolCall);

    fn render_tool_result(&mut self, name: &str, result: &ToolResult);

    /// Something the user should see that is not model output.
    fn render_notice(&mut self, notice: &str);

    /// The turn finished.
    fn render_done(&mut self);

    /// The turn ended on an error.
    fn render_error(&mut self, err: &str);
}

/// Renders streaming output directly to stdout.
///
/// Each fragment is printed immediately with an explicit flush so the user
/// sees a "typing" effect. A one-line status indicator is drawn while the
/// engine is between outputs and erased before any text is printed.
pub struct StdoutRenderer {
    /// A status indicator is on screen.
    status_shown: bool,
    /// The cursor is not at the start of a line.
    mid_line: bool,
    /// Reasoning is being printed (dimmed).
    in_reasoning: bool,
}

impl StdoutRenderer {
    pub fn new() -> Self {
        Self {
            status_shown: false,
            mid_line: false,
            in_reasoning: false,
        }
    }

    fn clear_status(&mut self) {
        if self.status_shown {
            print!("{CLEAR_LINE}");
            self.status_shown = false;
        }
    }

    fn end_line(&mut self) {
        self.clear_status();
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }

    fn write(&mut self, text: &str) {
        self.clear_status();
        print!("{text}");
        io::stdout().flush().ok();
        self.mid_line = !text.ends_with('\n');
    }
}

impl Default for StdoutRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for StdoutRenderer {
    fn progress(&mut self, state: &State) {
        // Only draw the indicator on an empty line so it never clobbers text.
        if self.mid_line || matches!(state, State::Idle) {
            return;
        }
        let label = format!("{} {}", state.icon(), state.label());
        print!("{CLEAR_LINE}{}", label.color(state.color()));
        io::stdout().flush().ok();
        self.status_shown = true;
    }

    fn render_reasoning(&mut self, text: &str) {
        self.in_reasoning = true;
        self.write(&text.dimmed().to_string());
    }

    fn render_token(&mut self, token: &str) {
        if self.in_reasoning {
            self.end_line();
            self.in_reasoning = false;
        }
        self.write(token);
    }

    fn render_tool_call(&mut self, call: &ToolCall) {
        self.end_line();
        self.in_reasoning = false;
        println!(
            "{} {} {}",
            "▶".magenta(),
            call.name.magenta().bold(),
            call.arguments.to_string().dimmed()
        );
    }

    fn render_tool_result(&mut self, name: &str, result: &ToolResult) {
        self.end_line();
        if result.success {
            println!("{} {}", "✓".green(), name.dimmed());
        } else {
            let reason = result.error.as_deref().unwrap_or("failed");
            println!("{} {} {}", "✗".red(), name.dimmed(), reason.red());
        }
    }

    fn render_notice(&mut self, notice: &str) {
        self.end_line();
        println!("{}", notice.yellow());
    }

    fn render_done(&mut self) {
        self.end_line();
        self.in_reasoning = false;
        println!();
    }

    fn render_error(&mut self, err: &str) {
        self.end_line();
        self.in_reasoning = false;
        eprintln!("{} {}", "error:".red().bold(), err);
    }
}
