//! Directory listing tool.

use async_trait::async_trait;
use deputy_core::error::ToolError;
use deputy_core::role::tool_names::LIST_FILES;
use deputy_core::tool::Tool;

use crate::workspace::{Workspace, walk_files};

/// Maximum entries listed before the output notes the remainder.
const MAX_ENTRIES: usize = 1000;

pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        LIST_FILES
    }

    fn description(&self) -> &str {
        "List files in a directory of the working directory. Directories end with '/'. Skips .git, node_modules and target."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the working directory (default '.')"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "List all files below the directory (default false)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let recursive = arguments["recursive"].as_bool().unwrap_or(false);

        let dir = self.workspace.resolve(LIST_FILES, path)?;
        if !dir.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool_name: LIST_FILES.into(),
                reason: format!("'{path}' is not a directory"),
            });
        }

        let walk_dir = dir.clone();
        let entries = tokio::task::spawn_blocking(move || walk_files(&walk_dir, recursive))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: LIST_FILES.into(),
                reason: e.to_string(),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: LIST_FILES.into(),
                reason: format!("failed to list '{path}': {e}"),
            })?;

        if entries.is_empty() {
            return Ok(format!("(no files in {path})"));
        }

        let total = entries.len();
        let mut lines: Vec<String> = entries
            .iter()
            .take(MAX_ENTRIES)
            .map(|p| {
                let shown = self.workspace.display(p);
                if p.is_dir() { format!("{shown}/") } else { shown }
            })
            .collect();
        if total > MAX_ENTRIES {
            lines.push(format!("... and {} more", total - MAX_ENTRIES));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/bin")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/bin/cli.rs"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn flat_listing_marks_directories() {
        let dir = fixture();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let out = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(out, "Cargo.toml\nsrc/");
    }

    #[tokio::test]
    async fn recursive_listing() {
        let dir = fixture();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let out = tool
            .execute(serde_json::json!({"path": "src", "recursive": true}))
            .await
            .unwrap();
        assert_eq!(out, "src/bin/cli.rs\nsrc/lib.rs");
    }

    #[tokio::test]
    async fn file_path_is_rejected() {
        let dir = fixture();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let err = tool
            .execute(serde_json::json!({"path": "Cargo.toml"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
