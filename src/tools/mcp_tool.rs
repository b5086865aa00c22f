//! A tool whose implementation lives in an external tool server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use super::{Tool, ToolDescriptor, ToolResult};
use crate::error::SubprocessError;
use crate::mcp::{RpcResponse, SubprocessRpcClient};

pub struct McpTool {
    descriptor: ToolDescriptor,
    client: Arc<Mutex<SubprocessRpcClient>>,
    available: AtomicBool,
}

impl McpTool {
    pub fn new(descriptor: ToolDescriptor, client: Arc<Mutex<SubprocessRpcClient>>) -> Self {
        Self {
            descriptor,
            client,
            available: AtomicBool::new(true),
        }
    }

    fn lost(&self) -> ToolResult {
        self.available.store(false, Ordering::Relaxed);
        ToolResult::failure(SubprocessError::ConnectionLost.to_string())
    }
}

/// Turn a `tools/call` result into tool output: the text of the first content
/// item, or the raw result JSON when there is none.
fn call_output(result: &Value) -> String {
    result
        .get("content")
        .and_then(|content| content.get(0))
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| result.to_string())
}

#[async_trait::async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn schema(&self) -> Value {
        self.descriptor.parameters.clone()
    }

    fn available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let mut client = self.client.lock().await;
        if !client.connected() {
            warn!(server = client.name(), tool = %self.descriptor.name, "Tool server is gone");
            return Ok(self.lost());
        }

        match client.call_tool(&self.descriptor.name, input).await {
            Ok(RpcResponse::Result(result)) => {
                let output = call_output(&result);
                if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
                    Ok(ToolResult::failure(output))
                } else {
                    Ok(ToolResult::success(output))
                }
            }
            Ok(RpcResponse::Error(err)) => Ok(ToolResult::failure(err.message)),
            Ok(RpcResponse::Empty) => {
                if client.connected() {
                    Ok(ToolResult::failure("no response from tool server"))
                } else {
                    Ok(self.lost())
                }
            }
            Err(SubprocessError::ConnectionLost) => Ok(self.lost()),
            Err(err) => Err(err.into()),
        }
    }

    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn takes_first_content_text() {
        let result = json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]});
        assert_eq!(call_output(&result), "a");
    }

    #[test]
    fn non_text_result_is_raw_json() {
        let result = json!({"value": 3});
        assert_eq!(call_output(&result), r#"{"value":3}"#);
    }
}
