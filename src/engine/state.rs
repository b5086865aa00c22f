use colored::Color;
use std::fmt;

/// Where the turn engine is. `Idle` is outside any turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Idle,
    /// Waiting for the next delta.
    Waiting,
    /// Receiving reasoning.
    Thinking,
    /// Running tool calls.
    Executing,
    /// Receiving answer text.
    Talking,
    /// A tool call failed; carries the reason.
    Error(String),
}

impl State {
    pub fn label(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Waiting => "waiting",
            State::Thinking => "thinking",
            State::Executing => "executing",
            State::Talking => "talking",
            State::Error(_) => "error",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            State::Idle => " ",
            State::Waiting => ".",
            State::Thinking => "*",
            State::Executing => ">",
            State::Talking => "~",
            State::Error(_) => "X",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            State::Idle => Color::White,
            State::Waiting => Color::Cyan,
            State::Thinking => Color::Yellow,
            State::Executing => Color::Magenta,
            State::Talking => Color::White,
            State::Error(_) => Color::Red,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Error(reason) => write!(f, "error ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}
