//! Message types for ember's conversation log.
//!
//! [`Message`] serializes directly into the chat request body. Tool calls use
//! the function-call wire shape shared by Ollama and OpenAI-compatible
//! backends, and echo their arguments back in the encoding the backend used.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireToolCall", from = "WireToolCall")]
pub struct ToolCall {
    /// Backend-assigned identifier, when the backend supplies one.
    pub id: Option<String>,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: Value,
    pub encoding: ArgumentEncoding,
}

/// How a backend transmits tool-call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentEncoding {
    /// A JSON object (Ollama).
    #[default]
    Object,
    /// A JSON-encoded string (OpenAI-compatible).
    String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
            encoding: ArgumentEncoding::Object,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

impl From<ToolCall> for WireToolCall {
    fn from(call: ToolCall) -> Self {
        let arguments = match (call.encoding, call.arguments) {
            (ArgumentEncoding::String, Value::String(raw)) => Value::String(raw),
            (ArgumentEncoding::String, value) => Value::String(value.to_string()),
            (ArgumentEncoding::Object, value) => value,
        };
        Self {
            id: call.id,
            kind: function_kind(),
            function: WireFunction {
                name: call.name,
                arguments,
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(wire: WireToolCall) -> Self {
        let encoding = if wire.function.arguments.is_string() {
            ArgumentEncoding::String
        } else {
            ArgumentEncoding::Object
        };
        Self {
            id: wire.id,
            name: wire.function.name,
            arguments: normalize_arguments(wire.function.arguments),
            encoding,
        }
    }
}

/// Coerce tool-call arguments into a JSON object.
///
/// Backends send either an object or a JSON-encoded string; an empty string
/// or `null` means no arguments. Strings that do not parse are kept as-is so
/// schema validation can reject them.
pub fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::Null => Value::Object(Map::new()),
        Value::String(raw) if raw.trim().is_empty() => Value::Object(Map::new()),
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The call a `tool` message answers, for backends that assign ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// The role of a message sender in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}
