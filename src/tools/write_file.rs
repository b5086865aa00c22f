//! Write tool: creates or overwrites a file inside the project root.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::{Tool, ToolResult};

/// Tool that writes string content to a file within the project root.
///
/// Parent directories are created automatically. Paths that resolve outside
/// the project root are rejected.
///
/// # Errors
///
/// Execution fails if the resolved path escapes the project root or if the
/// filesystem write fails.
pub struct WriteFileTool {
    /// Project root directory. Paths are resolved relative to this.
    project_root: PathBuf,
}

impl WriteFileTool {
    /// Create a new `WriteFileTool` rooted at the given directory.
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// The target may not exist yet, so the *parent* is canonicalized and
    /// checked against the root. Parent directories are created on the way.
    async fn resolve_target(&self, path: &str) -> Result<PathBuf> {
        let resolved = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.project_root.join(path)
        };
        let parent = resolved
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Path has no parent directory: {}", path))?;
        let filename = resolved
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Path has no filename: {}", path))?;

        let root = self.project_root.canonicalize()?;
        if !nearest_existing(parent)?.starts_with(&root) {
            anyhow::bail!("Path escapes project directory: {}", path);
        }
        tokio::fs::create_dir_all(parent).await?;
        let parent = parent.canonicalize()?;
        if !parent.starts_with(&root) {
            anyhow::bail!("Path escapes project directory: {}", path);
        }
        Ok(parent.join(filename))
    }
}

/// Canonical form of the closest ancestor of `path` that exists.
fn nearest_existing(path: &Path) -> Result<PathBuf> {
    let mut current = path;
    loop {
        if let Ok(canonical) = current.canonicalize() {
            return Ok(canonical);
        }
        current = current
            .parent()
            .ok_or_else(|| anyhow::anyhow!("No existing ancestor for {}", path.display()))?;
    }
}

#[derive(Deserialize)]
struct WriteInput {
    path: String,
    content: String,
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing it if it exists. Creates parent directories. Path is relative to the project root."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to project root"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let input: WriteInput = serde_json::from_value(input)?;
        let path = self.resolve_target(&input.path).await?;
        tokio::fs::write(&path, &input.content).await?;
        Ok(ToolResult::success(format!(
            "Wrote {} bytes to {}",
            input.content.len(),
            input.path
        )))
    }
}
