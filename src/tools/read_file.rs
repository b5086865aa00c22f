use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::{resolve_existing, Tool, ToolResult};
use crate::constants::{BINARY_DETECTION_BYTES, READ_FILE_MAX_SIZE};

/// Tool that reads a UTF-8 text file within the project root.
///
/// Files over [`READ_FILE_MAX_SIZE`] and files with a NUL byte in their first
/// [`BINARY_DETECTION_BYTES`] are refused with a failure result.
///
/// # Errors
///
/// Execution fails if the path does not exist, escapes the project root, or
/// is not valid UTF-8.
pub struct ReadFileTool {
    /// Project root directory. Paths are resolved relative to this.
    project_root: PathBuf,
}

impl ReadFileTool {
    /// Create a new `ReadFileTool` rooted at the given directory.
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }
}

#[derive(Deserialize)]
struct ReadInput {
    path: String,
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file. Path is relative to the project root."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to project root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let input: ReadInput = serde_json::from_value(input)?;
        let path = resolve_existing(&self.project_root, &input.path)?;

        let size = tokio::fs::metadata(&path).await?.len();
        if size > READ_FILE_MAX_SIZE {
            return Ok(ToolResult::failure(format!(
                "File too large: {size} bytes (max {READ_FILE_MAX_SIZE})"
            )));
        }

        let content = tokio::fs::read(&path).await?;
        let head = &content[..content.len().min(BINARY_DETECTION_BYTES)];
        if head.contains(&0) {
            return Ok(ToolResult::failure("Binary file detected; refusing to read it."));
        }

        let text = String::from_utf8(content)
            .map_err(|_| anyhow::anyhow!("File is not valid UTF-8"))?;
        Ok(ToolResult::success(text))
    }
}
