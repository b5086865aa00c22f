//! Centralized constants for ember.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "ember";

/// Application version advertised to tool servers during the handshake.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default backend host (Ollama's local port).
pub const DEFAULT_HOST: &str = "localhost:11434";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-oss";

/// Path appended to a bare host to reach the streaming chat endpoint.
pub const DEFAULT_CHAT_PATH: &str = "/api/chat";

/// Default capability mode when none is configured.
pub const DEFAULT_MODE: &str = "auto";

/// Base system prompt. A mode line is appended per capability mode.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are ember, a terminal agent that helps with software tasks. \
Work step by step. Use the tools you are given to inspect and change the \
project instead of guessing, and keep answers short.";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-project configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = "ember.toml";

/// Tool server definitions looked up in the working directory.
pub const MCP_CONFIG_FILENAME: &str = ".mcp.json";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "chat_history.txt";

// --- Environment overrides ---

pub const ENV_HOST: &str = "OLLAMA_HOST";
pub const ENV_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_TOKEN: &str = "EMBER_TOKEN";
pub const ENV_MODE: &str = "EMBER_MODE";

/// Log level filter for the log file (`error`, `warn`, `info`, `debug`, `trace`).
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Default log level when `LOG_LEVEL` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// --- Network ---

/// Connect timeout for the chat endpoint, in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout for the chat endpoint, in seconds. Generation can be slow.
pub const READ_TIMEOUT_SECS: u64 = 3600;

// --- Turn engine ---

/// Maximum number of `chat()` round-trips within a single turn.
pub const DEFAULT_MAX_ROUNDS: usize = 25;

// --- Shell ---

/// Default shell used to run commands.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Readiness poll granularity for the shell loop, in milliseconds.
pub const SHELL_POLL_INTERVAL_MS: u64 = 100;

/// Bytes read per pipe read.
pub const SHELL_READ_CHUNK: usize = 4096;

/// Maximum captured output (bytes) handed back as tool output.
pub const BASH_MAX_OUTPUT_SIZE: usize = 30 * 1024;

/// Environment variables stripped before running shell commands.
pub const BASH_STRIPPED_ENV_VARS: &[&str] = &[
    "EMBER_TOKEN",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "OPENROUTER_API_KEY",
];

// --- Tool servers ---

/// JSON-RPC protocol revision sent in `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-08";

/// Grace period between SIGTERM and SIGKILL during shutdown, in seconds.
pub const SHUTDOWN_GRACE_SECS: u64 = 2;

/// Exit status after SIGTERM (128 + 15).
pub const TERMINATED_EXIT_CODE: i32 = 143;

// --- Tool limits ---

/// Maximum file size (bytes) the read tool will read.
pub const READ_FILE_MAX_SIZE: u64 = 100 * 1024;

/// Byte threshold for binary file detection (check first N bytes for null).
pub const BINARY_DETECTION_BYTES: usize = 8192;

/// Maximum number of results the list tool returns.
pub const GLOB_MAX_RESULTS: usize = 1000;

/// Maximum number of matching lines the grep tool returns.
pub const GREP_MAX_MATCHES: usize = 50;

/// Request timeout for the web tool, in seconds.
pub const WEB_TIMEOUT_SECS: u64 = 10;

/// Characters of page text the web tool returns for HTML.
pub const WEB_MAX_TEXT_CHARS: usize = 5000;

/// Bytes of raw body the web tool returns for other content types.
pub const WEB_MAX_BODY_BYTES: usize = 30 * 1024;
