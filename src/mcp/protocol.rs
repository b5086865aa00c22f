//! JSON-RPC 2.0 messages exchanged with tool servers, one per line.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::{APP_NAME, APP_VERSION, MCP_PROTOCOL_VERSION};
use crate::tools::ToolDescriptor;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RpcNotification<'a> {
    jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> RpcNotification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
    Result(Value),
    Error(RpcErrorBody),
    /// The server closed its stdout or sent a blank line.
    Empty,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

impl RpcResponse {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let raw: RawResponse = serde_json::from_str(line)?;
        Ok(match (raw.error, raw.result) {
            (Some(error), _) => RpcResponse::Error(error),
            (None, Some(result)) => RpcResponse::Result(result),
            (None, None) => RpcResponse::Empty,
        })
    }
}

pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "clientInfo": { "name": APP_NAME, "version": APP_VERSION }
    })
}

#[derive(Debug, Deserialize)]
struct RemoteTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<RemoteTool>,
}

/// Parse a `tools/list` result into descriptors. A missing schema becomes an
/// empty object schema.
pub fn parse_tools_list(result: Value) -> Result<Vec<ToolDescriptor>, serde_json::Error> {
    let list: ToolsListResult = serde_json::from_value(result)?;
    Ok(list
        .tools
        .into_iter()
        .map(|tool| {
            let parameters = tool
                .input_schema
                .filter(Value::is_object)
                .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
            ToolDescriptor::new(tool.name, tool.description.unwrap_or_default(), parameters)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_shape() {
        let line = serde_json::to_value(RpcRequest::new(7, "tools/list", json!({}))).unwrap();
        assert_eq!(
            line,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list", "params": {}})
        );
    }

    #[test]
    fn notification_has_no_id() {
        let line =
            serde_json::to_value(RpcNotification::new("notifications/initialized", None)).unwrap();
        assert_eq!(line, json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
    }

    #[test]
    fn parses_result_error_and_empty() {
        assert_eq!(
            RpcResponse::parse(r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#).unwrap(),
            RpcResponse::Result(json!({"ok": true}))
        );
        match RpcResponse::parse(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"nope"}}"#)
            .unwrap()
        {
            RpcResponse::Error(body) => {
                assert_eq!(body.code, -32601);
                assert_eq!(body.message, "nope");
            }
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(
            RpcResponse::parse(r#"{"jsonrpc":"2.0","id":1}"#).unwrap(),
            RpcResponse::Empty
        );
    }

    #[test]
    fn tools_list_maps_input_schema() {
        let tools = parse_tools_list(json!({
            "tools": [
                {"name": "echo", "description": "Echo", "inputSchema": {"type": "object", "required": ["text"]}},
                {"name": "ping"}
            ]
        }))
        .unwrap();
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].parameters["required"], json!(["text"]));
        assert_eq!(tools[1].description, "");
        assert_eq!(tools[1].parameters["type"], "object");
    }
}
