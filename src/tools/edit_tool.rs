//! Edit tool: exact-text replacement in an existing file.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::{resolve_existing, Tool, ToolResult};

/// Tool that performs exact-text replacement on existing files.
///
/// Replaces the first match, or every match with `replace_all`. Paths that
/// resolve outside the project root are rejected.
///
/// # Errors
///
/// Execution fails if the path escapes the project root, the file does not
/// exist, or the filesystem read/write fails. A missing `old_text` is a
/// failure result rather than an error.
pub struct EditTool {
    /// Project root directory. Paths are resolved relative to this.
    project_root: PathBuf,
}

impl EditTool {
    /// Create a new `EditTool` rooted at the given directory.
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }
}

#[derive(Deserialize)]
struct EditInput {
    path: String,
    old_text: String,
    new_text: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait::async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Replace exact text in an existing file. Replaces the first match unless replace_all is set."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to project root"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to find, including whitespace"
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default false)"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let input: EditInput = serde_json::from_value(input)?;
        if input.old_text.is_empty() {
            return Ok(ToolResult::failure("old_text must not be empty"));
        }
        let path = resolve_existing(&self.project_root, &input.path)?;
        let content = tokio::fs::read_to_string(&path).await?;

        let occurrences = content.matches(&input.old_text).count();
        if occurrences == 0 {
            return Ok(ToolResult::failure(format!(
                "Text not found in {}. old_text must match exactly.",
                input.path
            )));
        }

        let (updated, replaced) = if input.replace_all {
            (content.replace(&input.old_text, &input.new_text), occurrences)
        } else {
            (content.replacen(&input.old_text, &input.new_text, 1), 1)
        };
        tokio::fs::write(&path, updated).await?;

        Ok(ToolResult::success(format!(
            "Edited {}: replaced {} of {} occurrence(s)",
            input.path, replaced, occurrences
        )))
    }
}
