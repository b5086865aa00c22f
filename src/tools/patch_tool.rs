//! Patch tool: applies a unified diff with `git apply`.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Tool, ToolResult};

/// Tool that applies a unified diff inside the project root.
///
/// The diff is piped to `git apply -p1` running in the project root, which
/// also works outside a git repository. Every file named in the diff headers
/// must be relative and stay inside the root.
///
/// # Errors
///
/// Execution fails if `git` cannot be started. A rejected patch is a failure
/// result carrying git's output.
pub struct PatchTool {
    /// Project root directory. Diff paths are resolved relative to this.
    project_root: PathBuf,
}

impl PatchTool {
    /// Create a new `PatchTool` rooted at the given directory.
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }
}

#[derive(Deserialize)]
struct PatchInput {
    diff: String,
}

/// Paths from the `---`/`+++` headers with the `a/`/`b/` prefix stripped.
/// `/dev/null` is skipped.
fn diff_paths(diff: &str) -> Vec<&str> {
    diff.lines()
        .filter_map(|line| {
            line.strip_prefix("--- ")
                .or_else(|| line.strip_prefix("+++ "))
        })
        .map(|rest| rest.split('\t').next().unwrap_or(rest).trim())
        .filter(|path| *path != "/dev/null")
        .map(|path| {
            path.strip_prefix("a/")
                .or_else(|| path.strip_prefix("b/"))
                .unwrap_or(path)
        })
        .collect()
}

fn stays_inside(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[async_trait::async_trait]
impl Tool for PatchTool {
    fn name(&self) -> &str {
        "patch"
    }

    fn description(&self) -> &str {
        "Apply a unified diff (git format, a/ and b/ prefixes) to files in the project root. Use for surgical edits to existing files."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "diff": {
                    "type": "string",
                    "description": "Unified diff to apply"
                }
            },
            "required": ["diff"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let input: PatchInput = serde_json::from_value(input)?;
        let paths = diff_paths(&input.diff);
        if paths.is_empty() {
            return Ok(ToolResult::failure("Diff names no files"));
        }
        if let Some(bad) = paths.iter().find(|p| !stays_inside(p)) {
            return Ok(ToolResult::failure(format!(
                "Path escapes project directory: {bad}"
            )));
        }

        let mut child = Command::new("git")
            .args(["apply", "--whitespace=nowarn", "-p1", "-"])
            .current_dir(&self.project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.diff.as_bytes()).await?;
            if !input.diff.ends_with('\n') {
                stdin.write_all(b"\n").await?;
            }
        }
        let output = child.wait_with_output().await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim_end().to_string();

        if output.status.success() {
            let mut files = paths;
            files.dedup();
            Ok(ToolResult::success(format!("Patched {}", files.join(", "))))
        } else {
            Ok(ToolResult::failure_with_output(
                text,
                format!("git apply failed (exit {})", output.status.code().unwrap_or(-1)),
            ))
        }
    }
}
