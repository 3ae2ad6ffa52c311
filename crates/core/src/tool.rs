//! Tool trait: the abstraction over agent capabilities.
//!
//! The (name, description, schema) triple is the whole interface between the
//! orchestration core and a concrete executor. Executors may fail with a
//! [`ToolError`], but the registry turns every failure into ordinary result
//! text so the driving model can read it and correct itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::message::{ToolCall, ToolResult};
use crate::provider::ToolDefinition;

/// The core Tool trait.
///
/// Core executors (file reads, edits, shell, code search) and the meta-tools
/// that delegate to sub-agents both implement this trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "bash", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The loop uses this to:
/// 1. Get tool definitions to advertise to the model (in registration order)
/// 2. Look up and execute tools when the model requests them
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// A new registry holding only the named tools. Unknown names are skipped.
    pub fn filtered(&self, names: &[&str]) -> Self {
        let mut out = Self::new();
        for name in names {
            if let Some(tool) = self.tools.get(*name) {
                out.register(tool.clone());
            }
        }
        out
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Execute a tool call. Never fails: errors come back as result text.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if let Some(reason) = &call.malformed {
            return ToolResult::error(
                call,
                format!(
                    "Error: {}",
                    ToolError::InvalidArguments(format!(
                        "could not parse input for '{}': {reason}",
                        call.name
                    ))
                ),
            );
        }

        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::error(
                call,
                format!("Error: {}", ToolError::NotFound(call.name.clone())),
            );
        };

        match tool.execute(call.input.clone()).await {
            Ok(output) => ToolResult::success(call, output),
            Err(e) => ToolResult::error(call, format!("Error: {e}")),
        }
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
