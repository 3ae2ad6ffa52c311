//! File read tool: numbered file contents, optionally a line window.

use async_trait::async_trait;
use deputy_core::error::ToolError;
use deputy_core::role::tool_names::READ_FILE;
use deputy_core::tool::Tool;

use crate::cap_output;
use crate::workspace::Workspace;

/// Upper bound on characters returned from one read.
const MAX_READ_CHARS: usize = 100_000;

pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        READ_FILE
    }

    fn description(&self) -> &str {
        "Read a file from the working directory. Returns numbered lines. Use offset and limit to read a window of a large file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working directory"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-based line to start from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let offset = arguments["offset"].as_u64().unwrap_or(1).max(1) as usize;
        let limit = arguments["limit"].as_u64().map(|l| l as usize);

        let resolved = self.workspace.resolve(READ_FILE, path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: READ_FILE.into(),
                reason: format!("failed to read '{path}': {e}"),
            })?;

        if content.is_empty() {
            return Ok(format!("(empty file: {path})"));
        }

        let total = content.lines().count();
        if offset > total {
            return Err(ToolError::InvalidArguments(format!(
                "offset {offset} is past the end of '{path}' ({total} lines)"
            )));
        }

        let numbered: Vec<String> = content
            .lines()
            .enumerate()
            .skip(offset - 1)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(i, line)| format!("{:>6}\t{line}", i + 1))
            .collect();

        Ok(cap_output(&numbered.join("\n"), MAX_READ_CHARS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(dir: &tempfile::TempDir) -> ReadFileTool {
        ReadFileTool::new(Workspace::new(dir.path()))
    }

    #[test]
    fn tool_definition() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(&dir);
        assert_eq!(tool.name(), "read_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
    }

    #[tokio::test]
    async fn reads_numbered_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "alpha\nbeta\ngamma\n").unwrap();
        let out = tool(&dir)
            .execute(serde_json::json!({"path": "notes.txt"}))
            .await
            .unwrap();
        assert!(out.contains("     1\talpha"));
        assert!(out.contains("     3\tgamma"));
    }

    #[tokio::test]
    async fn offset_and_limit_window() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=10).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("big.txt"), body).unwrap();
        let out = tool(&dir)
            .execute(serde_json::json!({"path": "big.txt", "offset": 4, "limit": 2}))
            .await
            .unwrap();
        assert_eq!(out, "     4\tline 4\n     5\tline 5");
    }

    #[tokio::test]
    async fn missing_file_is_execution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(&dir)
            .execute(serde_json::json!({"path": "nope.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn escaping_path_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(&dir)
            .execute(serde_json::json!({"path": "../../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(&dir).execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
