//! File edit tool: exact string replacement, or file creation.

use async_trait::async_trait;
use deputy_core::error::ToolError;
use deputy_core::role::tool_names::EDIT_FILE;
use deputy_core::tool::Tool;

use crate::workspace::Workspace;

pub struct EditFileTool {
    workspace: Workspace,
}

impl EditFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: EDIT_FILE.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        EDIT_FILE
    }

    fn description(&self) -> &str {
        "Edit a file by replacing an exact string. old_string must match exactly once unless replace_all is set. To create a new file, pass an empty old_string and the full contents as new_string."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working directory"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace (empty to create a new file)"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let old_string = arguments["old_string"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'old_string' argument".into()))?;
        let new_string = arguments["new_string"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'new_string' argument".into()))?;
        let replace_all = arguments["replace_all"].as_bool().unwrap_or(false);

        let resolved = self.workspace.resolve(EDIT_FILE, path)?;

        if !resolved.exists() {
            if !old_string.is_empty() {
                return Err(Self::failed(format!(
                    "'{path}' does not exist; pass an empty old_string to create it"
                )));
            }
            if let Some(parent) = resolved.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Self::failed(format!("failed to create directory: {e}")))?;
            }
            tokio::fs::write(&resolved, new_string)
                .await
                .map_err(|e| Self::failed(format!("failed to write '{path}': {e}")))?;
            return Ok(format!("Created {path} ({} bytes)", new_string.len()));
        }

        if old_string.is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "'{path}' already exists; old_string must not be empty"
            )));
        }

        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| Self::failed(format!("failed to read '{path}': {e}")))?;

        let (updated, summary) = match content.matches(old_string).count() {
            0 => return Err(Self::failed(format!("old_string not found in '{path}'"))),
            1 => (
                content.replacen(old_string, new_string, 1),
                format!("Edited {path}"),
            ),
            n if replace_all => (
                content.replace(old_string, new_string),
                format!("Replaced {n} occurrences in {path}"),
            ),
            n => {
                return Err(Self::failed(format!(
                    "old_string matches {n} times in '{path}'; add surrounding context or set replace_all"
                )));
            }
        };

        tokio::fs::write(&resolved, &updated)
            .await
            .map_err(|e| Self::failed(format!("failed to write '{path}': {e}")))?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(dir: &tempfile::TempDir) -> EditFileTool {
        EditFileTool::new(Workspace::new(dir.path()))
    }

    #[test]
    fn tool_definition() {
        let dir = tempfile::tempdir().unwrap();
        let schema = tool(&dir).parameters_schema();
        assert_eq!(
            schema["required"],
            serde_json::json!(["path", "old_string", "new_string"])
        );
    }

    #[tokio::test]
    async fn creates_missing_file_with_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(&dir)
            .execute(serde_json::json!({
                "path": "nested/foo.txt",
                "old_string": "",
                "new_string": "bar"
            }))
            .await
            .unwrap();
        assert!(out.starts_with("Created nested/foo.txt"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/foo.txt")).unwrap(),
            "bar"
        );
    }

    #[tokio::test]
    async fn replaces_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() { old(); }").unwrap();
        tool(&dir)
            .execute(serde_json::json!({
                "path": "main.rs",
                "old_string": "old()",
                "new_string": "new()"
            }))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("main.rs")).unwrap(),
            "fn main() { new(); }"
        );
    }

    #[tokio::test]
    async fn ambiguous_match_is_refused_without_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x x").unwrap();
        let err = tool(&dir)
            .execute(serde_json::json!({"path": "a.txt", "old_string": "x", "new_string": "y"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("matches 3 times"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "x x x");

        let out = tool(&dir)
            .execute(serde_json::json!({
                "path": "a.txt", "old_string": "x", "new_string": "y", "replace_all": true
            }))
            .await
            .unwrap();
        assert!(out.contains("3 occurrences"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "y y y");
    }

    #[tokio::test]
    async fn missing_match_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let err = tool(&dir)
            .execute(serde_json::json!({"path": "a.txt", "old_string": "bye", "new_string": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn cannot_write_outside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(&dir)
            .execute(serde_json::json!({
                "path": "../escape.txt", "old_string": "", "new_string": "x"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }
}
