//! Meta-tools: the delegation surface advertised only to Main.
//!
//! Each tool hands its input to the [`SubagentScheduler`] and returns one
//! budgeted string. Delegate failures are already rendered as text by the
//! scheduler, so these tools fail only on bad arguments.

use std::sync::Arc;

use async_trait::async_trait;
use deputy_core::error::ToolError;
use deputy_core::role::tool_names::*;
use deputy_core::tool::{Tool, ToolRegistry};

use crate::fanout::ParallelFanout;
use crate::prompts::RequestKind;
use crate::subagent::{SubagentScheduler, SubagentTask};

/// Register all meta-tools, in advertisement order.
pub fn register_meta_tools(registry: &mut ToolRegistry, scheduler: Arc<SubagentScheduler>) {
    registry.register(Arc::new(ConsultOracleTool::new(scheduler.clone())));
    registry.register(Arc::new(CodebaseSearchTool::new(scheduler.clone())));
    registry.register(Arc::new(ConsultLibrarianTool::new(scheduler.clone())));
    registry.register(Arc::new(SpawnSubagentTool::new(scheduler.clone())));
    registry.register(Arc::new(ParallelSubagentsTool::new(scheduler)));
}

fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

fn task_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Short label for the task"
            },
            "task": {
                "type": "string",
                "description": "Complete, self-contained instructions"
            },
            "working_directory": {
                "type": "string",
                "description": "Directory to work in, relative to the project root"
            },
            "max_output_tokens": {
                "type": "integer",
                "description": "Budget for the returned report"
            },
            "output_format": {
                "type": "string",
                "enum": ["text", "markdown", "json"]
            }
        },
        "required": ["name", "task"]
    })
}

fn parse_task(value: serde_json::Value) -> Result<SubagentTask, ToolError> {
    let task: SubagentTask = serde_json::from_value(value)
        .map_err(|e| ToolError::InvalidArguments(format!("invalid subagent task: {e}")))?;
    if task.task.trim().is_empty() {
        return Err(ToolError::InvalidArguments(format!(
            "task '{}' has empty instructions",
            task.name
        )));
    }
    Ok(task)
}

pub struct ConsultOracleTool {
    scheduler: Arc<SubagentScheduler>,
}

impl ConsultOracleTool {
    pub fn new(scheduler: Arc<SubagentScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ConsultOracleTool {
    fn name(&self) -> &str {
        CONSULT_ORACLE
    }

    fn description(&self) -> &str {
        "Ask the oracle, a read-only senior engineer, to analyze a hard problem: architecture, debugging, code review, trade-offs."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "What you need analyzed"
                },
                "context": {
                    "type": "string",
                    "description": "Relevant findings so far (files, errors, constraints)"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let question = required_str(&arguments, "question")?;
        let context = arguments["context"].as_str();
        Ok(self.scheduler.consult_oracle(question, context).await)
    }
}

pub struct CodebaseSearchTool {
    scheduler: Arc<SubagentScheduler>,
}

impl CodebaseSearchTool {
    pub fn new(scheduler: Arc<SubagentScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for CodebaseSearchTool {
    fn name(&self) -> &str {
        CODEBASE_SEARCH
    }

    fn description(&self) -> &str {
        "Find code by description. A search agent explores the repository and returns relevant files and line numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to find, in plain language"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = required_str(&arguments, "query")?;
        Ok(self.scheduler.search(query).await)
    }
}

pub struct ConsultLibrarianTool {
    scheduler: Arc<SubagentScheduler>,
}

impl ConsultLibrarianTool {
    pub fn new(scheduler: Arc<SubagentScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ConsultLibrarianTool {
    fn name(&self) -> &str {
        CONSULT_LIBRARIAN
    }

    fn description(&self) -> &str {
        "Ask the librarian about documentation, library APIs, usage examples or error messages."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The research question"
                },
                "request_type": {
                    "type": "string",
                    "enum": ["conceptual", "implementation", "examples", "troubleshooting"],
                    "description": "Kind of answer wanted (classified automatically when omitted)"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let question = required_str(&arguments, "question")?;
        let kind = match arguments["request_type"].as_str() {
            Some(raw) => Some(raw.parse::<RequestKind>().map_err(ToolError::InvalidArguments)?),
            None => None,
        };
        Ok(self.scheduler.consult_librarian(question, kind).await)
    }
}

pub struct SpawnSubagentTool {
    scheduler: Arc<SubagentScheduler>,
}

impl SpawnSubagentTool {
    pub fn new(scheduler: Arc<SubagentScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for SpawnSubagentTool {
    fn name(&self) -> &str {
        SPAWN_SUBAGENT
    }

    fn description(&self) -> &str {
        "Hand a self-contained task to an isolated subagent with full read/write tools. Only its final report comes back."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        task_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let task = parse_task(arguments)?;
        Ok(self.scheduler.spawn_text(&task).await)
    }
}

pub struct ParallelSubagentsTool {
    fanout: ParallelFanout,
}

impl ParallelSubagentsTool {
    pub fn new(scheduler: Arc<SubagentScheduler>) -> Self {
        Self {
            fanout: ParallelFanout::new(scheduler),
        }
    }
}

#[async_trait]
impl Tool for ParallelSubagentsTool {
    fn name(&self) -> &str {
        PARALLEL_SUBAGENTS
    }

    fn description(&self) -> &str {
        "Run several independent subagent tasks at once. Tasks must touch disjoint files. Reports come back in task order."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "items": task_schema(),
                    "minItems": 1
                }
            },
            "required": ["tasks"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let raw = arguments["tasks"]
            .as_array()
            .filter(|tasks| !tasks.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("'tasks' must be a non-empty array".into()))?;
        let tasks = raw
            .iter()
            .cloned()
            .map(parse_task)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.fanout.run(tasks).await.render())
    }
}
