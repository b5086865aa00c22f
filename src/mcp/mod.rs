//! Delegated tool servers (MCP over stdio).

mod client;
mod protocol;

pub use client::SubprocessRpcClient;
pub use protocol::RpcResponse;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::McpServerConfig;
use crate::mode::Capability;
use crate::tools::mcp_tool::McpTool;
use crate::tools::ToolRegistry;

pub type SharedClient = Arc<Mutex<SubprocessRpcClient>>;

/// Start every configured server and register its tools with
/// [`Capability::Execute`]. A server that fails to start is logged and
/// skipped.
pub async fn connect_all(
    servers: &BTreeMap<String, McpServerConfig>,
    registry: &mut ToolRegistry,
) -> Vec<SharedClient> {
    let mut clients = Vec::new();
    for (name, config) in servers {
        let client = match SubprocessRpcClient::connect(name, config).await {
            Ok(client) => client,
            Err(err) => {
                warn!(server = %name, error = %err, "Failed to start tool server");
                continue;
            }
        };
        info!(server = %name, tools = client.tools().len(), "Connected to tool server");

        let descriptors = client.tools().to_vec();
        let shared = Arc::new(Mutex::new(client));
        for descriptor in descriptors {
            registry.register_tool(
                Arc::new(McpTool::new(descriptor, shared.clone())),
                Capability::Execute,
            );
        }
        clients.push(shared);
    }
    clients
}

pub async fn shutdown_all(clients: &[SharedClient]) {
    for client in clients {
        let mut client = client.lock().await;
        let outcome = client.shutdown().await;
        info!(server = client.name(), outcome = ?outcome, "Tool server shut down");
    }
}
