use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::{Tool, ToolResult};

use crate::constants::GLOB_MAX_RESULTS;

/// Lists files matching a glob pattern.
pub struct GlobTool {
    project_root: PathBuf,
}

impl GlobTool {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }
}

#[derive(Deserialize)]
struct ListInput {
    #[serde(default = "default_pattern")]
    pattern: String,
}

fn default_pattern() -> String {
    "*".to_string()
}

#[async_trait::async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "List files matching a glob pattern relative to the project root (default '*')."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern, e.g. 'src/**/*.rs'"
                }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        let input: ListInput = serde_json::from_value(input)?;
        let root = self.project_root.canonicalize()?;
        let pattern = root.join(&input.pattern);

        let mut paths: Vec<String> = Vec::new();
        let mut truncated = false;
        for entry in glob::glob(&pattern.to_string_lossy())? {
            if paths.len() >= GLOB_MAX_RESULTS {
                truncated = true;
                break;
            }
            // Unreadable entries and broken symlinks are skipped.
            let Ok(entry) = entry else { continue };
            match entry.canonicalize() {
                Ok(canonical) if canonical.starts_with(&root) => {}
                _ => continue,
            }
            let relative = entry.strip_prefix(&root).unwrap_or(&entry);
            paths.push(relative.display().to_string());
        }

        if paths.is_empty() {
            return Ok(ToolResult::success("No files matched the pattern."));
        }
        let mut listing = paths.join("\n");
        if truncated {
            listing.push_str(&format!("\n... truncated at {GLOB_MAX_RESULTS} results"));
        }
        Ok(ToolResult::success(listing))
    }
}
