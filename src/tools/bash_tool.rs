//! Bash tool: runs a command through [`ShellExecutor`] in the project root.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::{Tool, ToolResult};
use crate::constants::BASH_MAX_OUTPUT_SIZE;
use crate::shell::ShellExecutor;

pub struct BashTool {
    project_root: PathBuf,
    shell: ShellExecutor,
}

impl BashTool {
    pub fn new(project_root: PathBuf, shell: ShellExecutor) -> Self {
        Self {
            project_root,
            shell,
        }
    }
}

#[derive(Deserialize)]
struct BashInput {
    command: String,
}

/// Truncate `output` to at most `BASH_MAX_OUTPUT_SIZE` bytes, appending a
/// notice when truncation occurs.
fn cap_output(output: &str) -> String {
    if output.len() <= BASH_MAX_OUTPUT_SIZE {
        return output.to_string();
    }
    let mut end = BASH_MAX_OUTPUT_SIZE;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n... output truncated at {} bytes",
        &output[..end],
        BASH_MAX_OUTPUT_SIZE
    )
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command in the project root and return its output and exit status."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let input: BashInput = serde_json::from_value(input)?;
        let output = self
            .shell
            .run(&input.command, Some(&self.project_root))
            .await?;

        let text = cap_output(output.combined().trim_end());
        if output.success() {
            return Ok(ToolResult::success(text));
        }
        match output.status {
            Some(code) => Ok(ToolResult::failure_with_output(text, format!("Exit code: {code}"))),
            None => Ok(ToolResult::failure_with_output(text, "Terminated by signal")),
        }
    }
}
