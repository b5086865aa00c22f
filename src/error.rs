//! Error taxonomy for the library seams.
//!
//! Stream failures end a turn, dispatch failures become tool output, and
//! subprocess failures are either swallowed during cleanup or mark a tool
//! unavailable. The CLI edge wraps everything in [`anyhow`].

use thiserror::Error;

/// Failures while talking to the streaming chat endpoint.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Non-success status, or an error record inside the stream (no status).
    #[error("backend error{}: {}", status_suffix(.status), .body)]
    Protocol { status: Option<u16>, body: String },

    /// A record that could not be decoded.
    #[error("malformed stream record ({reason}): {record}")]
    Parse { reason: String, record: String },

    /// Connect or read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChatError {
    pub fn parse(reason: impl ToString, record: impl Into<String>) -> Self {
        ChatError::Parse {
            reason: reason.to_string(),
            record: record.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

/// Failures at the tool dispatch boundary. Never escapes the registry as an
/// `Err`; rendered into a failed [`crate::tools::ToolResult`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown tool")]
    UnknownTool,

    #[error("invalid arguments: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    Execution(String),
}

/// Failures of a delegated tool server process.
#[derive(Debug, Error)]
pub enum SubprocessError {
    /// The process could not be started or stopped.
    #[error("process lifecycle: {0}")]
    Lifecycle(String),

    /// The process died or its pipes closed mid-session.
    #[error("MCP connection lost")]
    ConnectionLost,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON-RPC message: {0}")]
    Json(#[from] serde_json::Error),
}
