//! Client for one delegated tool server.
//!
//! The server runs as a child process in its own process group and speaks
//! JSON-RPC over stdio, one message per line. Calls are strictly sequential:
//! a request is written, flushed, and exactly one response line is read
//! before anything else is sent.

use std::collections::BTreeMap;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::protocol::{
    initialize_params, parse_tools_list, RpcNotification, RpcRequest, RpcResponse,
};
use crate::config::McpServerConfig;
use crate::constants::SHUTDOWN_GRACE_SECS;
use crate::error::SubprocessError;
use crate::tools::ToolDescriptor;

/// How [`SubprocessRpcClient::shutdown`] ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    AlreadyExited,
    /// Exited within the grace period after SIGTERM.
    Terminated,
    /// Needed SIGKILL.
    Killed,
}

pub struct SubprocessRpcClient {
    name: String,
    child: Child,
    pgid: Option<libc::pid_t>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr_task: Option<JoinHandle<()>>,
    next_id: u64,
    /// Set while a request is waiting for its response line. Still set at
    /// the next request means the previous call was cancelled.
    awaiting_reply: bool,
    tools: Vec<ToolDescriptor>,
    grace: Duration,
    outcome: Option<ShutdownOutcome>,
}

impl SubprocessRpcClient {
    /// Start the server process without talking to it.
    pub fn spawn(
        name: &str,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self, SubprocessError> {
        debug!(server = name, command, args = ?args, "Starting tool server");
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| SubprocessError::Lifecycle(format!("failed to start {command}: {err}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SubprocessError::Lifecycle("unable to retrieve stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SubprocessError::Lifecycle("unable to retrieve stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SubprocessError::Lifecycle("unable to retrieve stderr".into()))?;

        // With process_group(0) the group id is the child's pid.
        let pgid = child.id().map(|pid| pid as libc::pid_t);
        let server = name.to_string();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(server = %server, "stderr: {line}");
            }
        });

        Ok(Self {
            name: name.to_string(),
            child,
            pgid,
            stdin: Some(stdin),
            stdout: Some(BufReader::new(stdout).lines()),
            stderr_task: Some(stderr_task),
            next_id: 0,
            awaiting_reply: false,
            tools: Vec::new(),
            grace: Duration::from_secs(SHUTDOWN_GRACE_SECS),
            outcome: None,
        })
    }

    /// Spawn the server and run the handshake: `initialize`,
    /// `notifications/initialized`, then `tools/list`.
    pub async fn connect(name: &str, config: &McpServerConfig) -> Result<Self, SubprocessError> {
        let mut client = Self::spawn(name, &config.command, &config.args, &config.env)?;
        if let Err(err) = client.handshake().await {
            client.shutdown().await;
            return Err(err);
        }
        Ok(client)
    }

    async fn handshake(&mut self) -> Result<(), SubprocessError> {
        match self.request("initialize", initialize_params()).await? {
            RpcResponse::Result(info) => {
                debug!(server = %self.name, info = %info, "Tool server initialized");
            }
            RpcResponse::Error(err) => {
                return Err(SubprocessError::Lifecycle(format!(
                    "initialize rejected: {}",
                    err.message
                )));
            }
            RpcResponse::Empty => {
                return Err(SubprocessError::Lifecycle(
                    "no response to initialize".into(),
                ));
            }
        }
        self.notify("notifications/initialized", None).await?;
        self.tools = self.list_tools().await?;
        debug!(server = %self.name, tools = self.tools.len(), "Tool server ready");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tools advertised during the handshake.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Send one request and read exactly one response line.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<RpcResponse, SubprocessError> {
        if self.awaiting_reply {
            let stdout = self.stdout.as_mut().ok_or(SubprocessError::ConnectionLost)?;
            let stale = stdout.next_line().await?;
            debug!(server = %self.name, stale = ?stale, "Discarded reply to a cancelled request");
            self.awaiting_reply = false;
        }

        self.next_id += 1;
        let id = self.next_id;
        let line = serde_json::to_string(&RpcRequest::new(id, method, params))?;
        debug!(server = %self.name, id, method, "JSON-RPC request");
        self.awaiting_reply = true;
        self.write_line(&line).await?;

        let stdout = self.stdout.as_mut().ok_or(SubprocessError::ConnectionLost)?;
        let next = stdout.next_line().await;
        self.awaiting_reply = false;
        let response = match next? {
            None => RpcResponse::Empty,
            Some(line) if line.trim().is_empty() => RpcResponse::Empty,
            Some(line) => RpcResponse::parse(&line)?,
        };
        debug!(server = %self.name, id, response = ?response, "JSON-RPC response");
        Ok(response)
    }

    /// Send a notification; no response is read.
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), SubprocessError> {
        let line = serde_json::to_string(&RpcNotification::new(method, params))?;
        debug!(server = %self.name, method, "JSON-RPC notification");
        self.write_line(&line).await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SubprocessError> {
        let stdin = self.stdin.as_mut().ok_or(SubprocessError::ConnectionLost)?;
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        written.map_err(|err| match err.kind() {
            io::ErrorKind::BrokenPipe => SubprocessError::ConnectionLost,
            _ => SubprocessError::Io(err),
        })
    }

    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, SubprocessError> {
        match self.request("tools/list", json!({})).await? {
            RpcResponse::Result(result) => Ok(parse_tools_list(result)?),
            RpcResponse::Error(err) => Err(SubprocessError::Lifecycle(format!(
                "tools/list failed: {}",
                err.message
            ))),
            RpcResponse::Empty => Ok(Vec::new()),
        }
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<RpcResponse, SubprocessError> {
        self.request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }

    /// Liveness check run before every call: the process is running, both
    /// pipes are open, and the OS still knows the process group.
    pub fn connected(&mut self) -> bool {
        if self.outcome.is_some() || self.stdin.is_none() || self.stdout.is_none() {
            return false;
        }
        if !matches!(self.child.try_wait(), Ok(None)) {
            return false;
        }
        match self.pgid {
            // SAFETY: getpgid only reads process table state.
            Some(pid) => unsafe { libc::getpgid(pid) >= 0 },
            None => false,
        }
    }

    /// Close the pipes, SIGTERM the process group, wait out the grace period,
    /// then SIGKILL. Errors are logged, never returned. Idempotent.
    pub async fn shutdown(&mut self) -> ShutdownOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        self.stdin.take();
        self.stdout.take();
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        let outcome = if matches!(self.child.try_wait(), Ok(Some(_))) {
            ShutdownOutcome::AlreadyExited
        } else {
            self.signal(libc::SIGTERM);
            match tokio::time::timeout(self.grace, self.child.wait()).await {
                Ok(_) => ShutdownOutcome::Terminated,
                Err(_) => {
                    warn!(server = %self.name, "Tool server ignored SIGTERM; sending SIGKILL");
                    self.signal(libc::SIGKILL);
                    if let Err(err) = self.child.wait().await {
                        warn!(server = %self.name, error = %err, "Failed to reap tool server");
                    }
                    ShutdownOutcome::Killed
                }
            }
        };
        debug!(server = %self.name, outcome = ?outcome, "Tool server stopped");
        self.outcome = Some(outcome);
        outcome
    }

    fn signal(&self, signal: libc::c_int) {
        let Some(pgid) = self.pgid else { return };
        if let Err(err) = signal_group(pgid, signal) {
            warn!(server = %self.name, signal, error = %err, "Failed to signal tool server");
        }
    }

    #[cfg(test)]
    fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

/// Signal a whole process group. A group that no longer exists counts as
/// success.
fn signal_group(pgid: libc::pid_t, signal: libc::c_int) -> Result<(), SubprocessError> {
    // SAFETY: killpg has no memory-safety preconditions.
    if unsafe { libc::killpg(pgid, signal) } == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(SubprocessError::Lifecycle(format!("killpg({pgid}, {signal}): {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const INIT_REPLY: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"serverInfo":{"name":"fake"}}}"#;
    const LIST_REPLY: &str = r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"Echo text","inputSchema":{"type":"object","properties":{"text":{"type":"string"}},"required":["text"]}}]}}"#;

    /// A fake server: answers the handshake, then replies to each further
    /// request with the next canned line.
    fn server(replies: &[&str]) -> McpServerConfig {
        let mut script = format!(
            "read l; printf '%s\\n' '{INIT_REPLY}'; read l; read l; printf '%s\\n' '{LIST_REPLY}'; "
        );
        for reply in replies {
            script.push_str(&format!("read l; printf '%s\\n' '{reply}'; "));
        }
        script.push_str("read l");
        McpServerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script],
            env: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn handshake_lists_tools() {
        let mut client = SubprocessRpcClient::connect("fake", &server(&[])).await.unwrap();
        assert_eq!(client.name(), "fake");
        assert_eq!(client.tools().len(), 1);
        assert_eq!(client.tools()[0].name, "echo");
        assert_eq!(client.tools()[0].parameters["required"], json!(["text"]));
        assert!(client.connected());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn call_tool_returns_result() {
        let reply = r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"hi"}]}}"#;
        let mut client = SubprocessRpcClient::connect("fake", &server(&[reply])).await.unwrap();
        let response = client.call_tool("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(
            response,
            RpcResponse::Result(json!({"content": [{"type": "text", "text": "hi"}]}))
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn call_tool_surfaces_rpc_error() {
        let reply = r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"bad params"}}"#;
        let mut client = SubprocessRpcClient::connect("fake", &server(&[reply])).await.unwrap();
        match client.call_tool("echo", json!({})).await.unwrap() {
            RpcResponse::Error(body) => {
                assert_eq!(body.code, -32602);
                assert_eq!(body.message, "bad params");
            }
            other => panic!("unexpected response: {other:?}"),
        }
        client.shutdown().await;
    }

    #[tokio::test]
    async fn reply_to_cancelled_call_is_not_mistaken_for_the_next() {
        let slow = r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"late"}]}}"#;
        let next = r#"{"jsonrpc":"2.0","id":4,"result":{"content":[{"type":"text","text":"fresh"}]}}"#;
        let script = format!(
            "read l; printf '%s\\n' '{INIT_REPLY}'; read l; read l; printf '%s\\n' '{LIST_REPLY}'; \
             read l; sleep 0.3; printf '%s\\n' '{slow}'; read l; printf '%s\\n' '{next}'; read l"
        );
        let config = McpServerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script],
            env: BTreeMap::new(),
        };
        let mut client = SubprocessRpcClient::connect("fake", &config).await.unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), client.call_tool("echo", json!({"text": "a"})))
                .await;
        assert!(cancelled.is_err());

        let response = client.call_tool("echo", json!({"text": "b"})).await.unwrap();
        assert_eq!(
            response,
            RpcResponse::Result(json!({"content": [{"type": "text", "text": "fresh"}]}))
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn closed_stdout_reads_as_empty_and_disconnects() {
        let mut config = server(&[]);
        // Exit right after the handshake instead of waiting for more input.
        if let Some(script) = config.args.last_mut() {
            *script = script.trim_end_matches("read l").to_string() + "exit 0";
        }
        let mut client = SubprocessRpcClient::connect("fake", &config).await.unwrap();

        let started = Instant::now();
        while client.connected() && started.elapsed() < Duration::from_secs(1) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!client.connected());

        match client.call_tool("echo", json!({})).await {
            Ok(RpcResponse::Empty) | Err(SubprocessError::ConnectionLost) => {}
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(client.shutdown().await, ShutdownOutcome::AlreadyExited);
    }

    #[tokio::test]
    async fn failed_handshake_is_an_error() {
        let config = McpServerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "exit 0".into()],
            env: BTreeMap::new(),
        };
        assert!(SubprocessRpcClient::connect("broken", &config).await.is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_lifecycle_error() {
        let err = SubprocessRpcClient::spawn(
            "missing",
            "/nonexistent/ember-tool-server",
            &[],
            &BTreeMap::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SubprocessError::Lifecycle(_)));
    }

    #[tokio::test]
    async fn shutdown_terminates_cooperative_server() {
        let mut client = SubprocessRpcClient::spawn(
            "sleepy",
            "sh",
            &["-c".into(), "exec sleep 30".into()],
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(client.shutdown().await, ShutdownOutcome::Terminated);
        // Second call returns the stored outcome.
        assert_eq!(client.shutdown().await, ShutdownOutcome::Terminated);
        assert!(!client.connected());
    }

    #[tokio::test]
    async fn shutdown_kills_server_ignoring_sigterm() {
        let client = SubprocessRpcClient::spawn(
            "stubborn",
            "sh",
            &["-c".into(), "trap '' TERM; while :; do sleep 0.1; done".into()],
            &BTreeMap::new(),
        )
        .unwrap();
        let mut client = client.with_grace(Duration::from_millis(300));
        // Let the shell install its trap first.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        assert_eq!(client.shutdown().await, ShutdownOutcome::Killed);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn signalling_vanished_group_is_ok() {
        // Far above any realistic pid_max.
        assert!(signal_group(0x3fff_fff0, libc::SIGTERM).is_ok());
    }
}
