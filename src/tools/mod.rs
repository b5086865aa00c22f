pub mod bash_tool;
pub mod edit_tool;
pub mod glob_tool;
pub mod grep_tool;
pub mod mcp_tool;
pub mod patch_tool;
pub mod read_file;
pub mod web_tool;
pub mod write_file;

use anyhow::Result;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::mode::{Capability, CapabilityMode};
use crate::shell::ShellExecutor;

use bash_tool::BashTool;
use edit_tool::EditTool;
use glob_tool::GlobTool;
use grep_tool::GrepTool;
use patch_tool::PatchTool;
use read_file::ReadFileTool;
use web_tool::WebTool;
use write_file::WriteFileTool;

/// The result of executing a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// A failure that still carries captured output (e.g. a non-zero exit).
    pub fn failure_with_output(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::failure(error)
        }
    }

    /// Text recorded as the tool message. Never empty.
    pub fn to_content(&self) -> String {
        if !self.success {
            let mut body = serde_json::Map::new();
            body.insert(
                "error".into(),
                Value::String(self.error.clone().unwrap_or_else(|| "tool failed".into())),
            );
            if !self.output.is_empty() {
                body.insert("output".into(), Value::String(self.output.clone()));
            }
            return Value::Object(body).to_string();
        }
        if self.output.is_empty() {
            "(no output)".to_string()
        } else {
            self.output.clone()
        }
    }
}

/// Tool metadata advertised to the model.
///
/// Serializes to `{"type":"function","function":{name, description, parameters}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireDescriptor", try_from = "WireDescriptor")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireDescriptor {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    description: String,
    parameters: Value,
}

impl From<ToolDescriptor> for WireDescriptor {
    fn from(d: ToolDescriptor) -> Self {
        Self {
            kind: "function".into(),
            function: WireFunction {
                name: d.name,
                description: d.description,
                parameters: d.parameters,
            },
        }
    }
}

impl TryFrom<WireDescriptor> for ToolDescriptor {
    type Error = String;

    fn try_from(wire: WireDescriptor) -> std::result::Result<Self, Self::Error> {
        if wire.kind != "function" {
            return Err(format!("unsupported tool type: {}", wire.kind));
        }
        Ok(Self {
            name: wire.function.name,
            description: wire.function.description,
            parameters: wire.function.parameters,
        })
    }
}

/// Every tool implements this trait.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool.
    fn name(&self) -> &str;

    /// Human-readable description sent with the tool list.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input parameters.
    fn schema(&self) -> Value;

    /// Whether the tool can currently be offered. Delegated tools turn this
    /// off when their server goes away.
    fn available(&self) -> bool {
        true
    }

    /// Execute the tool with the given JSON input.
    async fn execute(&self, input: Value) -> Result<ToolResult>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.schema())
    }
}

/// Adapter that lets a plain closure act as a [`Tool`].
struct FnTool<F> {
    descriptor: ToolDescriptor,
    handler: F,
}

#[async_trait::async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(Value) -> Result<ToolResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn schema(&self) -> Value {
        self.descriptor.parameters.clone()
    }

    async fn execute(&self, input: Value) -> Result<ToolResult> {
        (self.handler)(input)
    }

    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }
}

struct Entry {
    descriptor: ToolDescriptor,
    capability: Capability,
    tool: Arc<dyn Tool>,
    validator: Option<jsonschema::Validator>,
}

/// Holds all registered tools and dispatches calls by name.
pub struct ToolRegistry {
    entries: Vec<Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a closure handler under `descriptor`.
    pub fn register<F>(&mut self, descriptor: ToolDescriptor, capability: Capability, handler: F)
    where
        F: Fn(Value) -> Result<ToolResult> + Send + Sync + 'static,
    {
        self.register_tool(Arc::new(FnTool { descriptor, handler }), capability);
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>, capability: Capability) {
        let descriptor = tool.descriptor();
        let validator = match jsonschema::validator_for(&descriptor.parameters) {
            Ok(validator) => Some(validator),
            Err(err) => {
                warn!(tool = %descriptor.name, error = %err, "Invalid tool schema; arguments will not be validated");
                None
            }
        };
        let entry = Entry {
            descriptor,
            capability,
            tool,
            validator,
        };

        match self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.name == entry.descriptor.name)
        {
            Some(existing) => {
                debug!(tool = %entry.descriptor.name, "Replacing registered tool");
                *existing = entry;
            }
            None => self.entries.push(entry),
        }
    }

    /// Descriptors visible in `mode`, in registration order.
    pub fn tools_for(&self, mode: &CapabilityMode) -> Vec<ToolDescriptor> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| mode.contains(e.capability) && e.tool.available())
            .filter(|e| seen.insert(e.descriptor.name.as_str()))
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// Run a tool by name. Never fails: every problem becomes a failed result.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        match self.try_dispatch(name, args).await {
            Ok(result) => result,
            Err(err) => {
                warn!(tool = name, error = %err, "Tool dispatch failed");
                ToolResult::failure(err.to_string())
            }
        }
    }

    async fn try_dispatch(&self, name: &str, args: Value) -> Result<ToolResult, DispatchError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .ok_or(DispatchError::UnknownTool)?;

        if let Some(validator) = &entry.validator {
            let problems: Vec<String> = validator.iter_errors(&args).map(|e| e.to_string()).collect();
            if !problems.is_empty() {
                return Err(DispatchError::Validation(problems));
            }
        }

        debug!(tool = name, capability = %entry.capability, "Dispatching tool");
        match AssertUnwindSafe(entry.tool.execute(args)).catch_unwind().await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(DispatchError::Execution(format!("{err:#}"))),
            Err(_) => Err(DispatchError::Execution(format!("tool '{name}' panicked"))),
        }
    }

    /// `name: description` lines for the tools visible in `mode`, sorted.
    pub fn banner(&self, mode: &CapabilityMode) -> String {
        let mut lines: Vec<String> = self
            .tools_for(mode)
            .into_iter()
            .map(|d| format!("{}: {}", d.name, d.description))
            .collect();
        lines.sort();
        lines.join("\n")
    }

    /// How many tools are registered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ToolRegistry {
    /// Create a registry with all built-in tools.
    pub fn with_builtins(project_root: PathBuf, shell: ShellExecutor) -> Self {
        let mut registry = Self::new();
        registry.register_tool(Arc::new(ReadFileTool::new(project_root.clone())), Capability::Read);
        registry.register_tool(Arc::new(GlobTool::new(project_root.clone())), Capability::Read);
        registry.register_tool(Arc::new(GrepTool::new(project_root.clone())), Capability::Read);
        registry.register_tool(Arc::new(WriteFileTool::new(project_root.clone())), Capability::Write);
        registry.register_tool(Arc::new(EditTool::new(project_root.clone())), Capability::Write);
        registry.register_tool(Arc::new(PatchTool::new(project_root.clone())), Capability::Write);
        registry.register_tool(Arc::new(BashTool::new(project_root, shell)), Capability::Execute);
        registry.register_tool(Arc::new(WebTool::new()), Capability::Execute);
        registry
    }
}

/// Resolve `path` against `root` and make sure it stays inside it.
///
/// The target must exist.
pub(crate) fn resolve_existing(root: &Path, path: &str) -> Result<PathBuf> {
    let resolved = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        root.join(path)
    };
    let canonical = resolved.canonicalize()?;
    let root_canonical = root.canonicalize()?;
    if !canonical.starts_with(&root_canonical) {
        anyhow::bail!("Path escapes project directory: {}", path);
    }
    Ok(canonical)
}
