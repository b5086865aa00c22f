//! Shell command execution with live output.
//!
//! The child runs with stdin closed and separate stdout/stderr pipes. Both
//! pipes are read concurrently while the child runs and every chunk is
//! forwarded to an [`OutputSink`] as it arrives. A 100ms tick checks child
//! liveness so a background process that inherited a pipe cannot hang the
//! loop after the shell itself has exited.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::constants::{
    BASH_STRIPPED_ENV_VARS, DEFAULT_SHELL, SHELL_POLL_INTERVAL_MS, SHELL_READ_CHUNK,
};

/// Receives shell output while a command is still running.
pub trait OutputSink: Send + Sync {
    fn stdout(&self, text: &str);
    fn stderr(&self, text: &str);
}

/// Writes stdout as-is and stderr in red.
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn stdout(&self, text: &str) {
        use std::io::Write;
        print!("{text}");
        io::stdout().flush().ok();
    }

    fn stderr(&self, text: &str) {
        eprint!("{}", text.red());
    }
}

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the child was killed by a signal.
    pub status: Option<i32>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout, then a labelled stderr section when stderr is non-empty.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str("--- stderr ---\n");
            text.push_str(&self.stderr);
        }
        text
    }
}

#[derive(Clone)]
pub struct ShellExecutor {
    shell: String,
    sink: Arc<dyn OutputSink>,
    poll_interval: Duration,
}

impl ShellExecutor {
    pub fn new(shell: Option<String>, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            shell: shell.unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            sink,
            poll_interval: Duration::from_millis(SHELL_POLL_INTERVAL_MS),
        }
    }

    /// Run `command` through the shell and wait for it to finish.
    pub async fn run(&self, command: &str, cwd: Option<&Path>) -> io::Result<ShellOutput> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for var in BASH_STRIPPED_ENV_VARS {
            cmd.env_remove(var);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!(shell = %self.shell, command, "Running shell command");
        let mut child = cmd.spawn()?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut out_buf = [0u8; SHELL_READ_CHUNK];
        let mut err_buf = [0u8; SHELL_READ_CHUNK];
        let mut out_open = true;
        let mut err_open = true;
        // One timer for the whole loop, so steady output cannot starve the
        // liveness check.
        let mut liveness = tokio::time::interval_at(
            tokio::time::Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => match read {
                    Ok(0) => out_open = false,
                    Ok(n) => self.forward(&out_buf[..n], &mut out, false),
                    Err(e) => {
                        warn!(error = %e, "stdout read failed");
                        out_open = false;
                    }
                },
                read = stderr.read(&mut err_buf), if err_open => match read {
                    Ok(0) => err_open = false,
                    Ok(n) => self.forward(&err_buf[..n], &mut err, true),
                    Err(e) => {
                        warn!(error = %e, "stderr read failed");
                        err_open = false;
                    }
                },
                _ = liveness.tick() => {
                    if child.try_wait()?.is_some() {
                        debug!("Shell exited with pipes still open");
                        break;
                    }
                }
            }
        }

        if out_open {
            self.drain_ready(&mut stdout, &mut out, false).await;
        }
        if err_open {
            self.drain_ready(&mut stderr, &mut err, true).await;
        }

        let status = child.wait().await?;
        debug!(status = ?status.code(), "Shell command finished");
        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
            status: status.code(),
        })
    }

    fn forward(&self, chunk: &[u8], captured: &mut Vec<u8>, is_stderr: bool) {
        let text = String::from_utf8_lossy(chunk);
        if is_stderr {
            self.sink.stderr(&text);
        } else {
            self.sink.stdout(&text);
        }
        captured.extend_from_slice(chunk);
    }

    /// Read whatever is already buffered in a pipe without waiting for more.
    async fn drain_ready<R>(&self, pipe: &mut R, captured: &mut Vec<u8>, is_stderr: bool)
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; SHELL_READ_CHUNK];
        while let Ok(Ok(n)) = tokio::time::timeout(Duration::ZERO, pipe.read(&mut buf)).await {
            if n == 0 {
                break;
            }
            self.forward(&buf[..n], captured, is_stderr);
        }
    }
}

/// Collects sink output in memory.
#[cfg(test)]
#[derive(Default)]
pub struct CaptureSink {
    pub stdout: std::sync::Mutex<String>,
    pub stderr: std::sync::Mutex<String>,
}

#[cfg(test)]
impl OutputSink for CaptureSink {
    fn stdout(&self, text: &str) {
        self.stdout.lock().unwrap().push_str(text);
    }

    fn stderr(&self, text: &str) {
        self.stderr.lock().unwrap().push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn executor() -> (ShellExecutor, Arc<CaptureSink>) {
        let sink = Arc::new(CaptureSink::default());
        (ShellExecutor::new(None, sink.clone()), sink)
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let (shell, _) = executor();
        let output = shell
            .run("printf out; printf err >&2; exit 3", None)
            .await
            .unwrap();
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        let combined = output.combined();
        assert_eq!(combined.matches("out").count(), 1);
        assert_eq!(combined.matches("err").count(), 1);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn forwards_chunks_to_sink_by_stream() {
        let (shell, sink) = executor();
        shell
            .run("echo one; echo two >&2; echo three", None)
            .await
            .unwrap();
        assert_eq!(*sink.stdout.lock().unwrap(), "one\nthree\n");
        assert_eq!(*sink.stderr.lock().unwrap(), "two\n");
    }

    #[tokio::test]
    async fn background_child_holding_pipe_does_not_hang() {
        let (shell, _) = executor();
        let started = Instant::now();
        let output = shell.run("sleep 5 & echo started", None).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(output.status, Some(0));
        assert!(output.stdout.contains("started"));
    }

    #[tokio::test]
    async fn chatty_background_writer_does_not_hang() {
        let (shell, _) = executor();
        let started = Instant::now();
        let output = shell
            .run(
                "(i=0; while [ $i -lt 100 ]; do echo x; i=$((i+1)); sleep 0.05; done) & echo started",
                None,
            )
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(output.status, Some(0));
        assert!(output.stdout.contains("started"));
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = std::env::temp_dir().join(format!("ember_test_shell_cwd_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let (shell, _) = executor();
        let output = shell.run("pwd", Some(&dir)).await.unwrap();
        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(reported.canonicalize().unwrap(), dir.canonicalize().unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn stdin_is_closed() {
        let (shell, _) = executor();
        let output = shell.run("cat; echo after", None).await.unwrap();
        assert_eq!(output.stdout, "after\n");
    }

    #[test]
    fn combined_labels_stderr() {
        let output = ShellOutput {
            stdout: "a".into(),
            stderr: "b".into(),
            status: Some(1),
        };
        assert_eq!(output.combined(), "a\n--- stderr ---\nb");
    }
}
