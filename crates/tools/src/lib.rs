//! Core tool executors for deputy.
//!
//! Every tool is scoped to one working directory: paths that resolve
//! outside it are refused. Executors return plain text, and failures come
//! back as `ToolError`s that the registry turns into result text.

pub mod bash;
pub mod edit_file;
pub mod list_files;
pub mod read_file;
pub mod search_code;
pub mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use deputy_core::tool::ToolRegistry;

pub use bash::BashTool;
pub use edit_file::EditFileTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use search_code::SearchCodeTool;
pub use workspace::Workspace;

/// Create a registry holding the full core tool set for `working_dir`.
///
/// Roles narrow this with `ToolRegistry::filtered`.
pub fn core_registry(working_dir: impl Into<PathBuf>) -> ToolRegistry {
    let workspace = Workspace::new(working_dir);
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ReadFileTool::new(workspace.clone())));
    registry.register(Arc::new(ListFilesTool::new(workspace.clone())));
    registry.register(Arc::new(SearchCodeTool::new(workspace.clone())));
    registry.register(Arc::new(EditFileTool::new(workspace.clone())));
    registry.register(Arc::new(BashTool::new(workspace)));
    registry
}

/// Keep the first `max_chars` characters, noting how many were dropped.
pub(crate) fn cap_output(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}\n... [output truncated: {} more characters]", total - max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deputy_core::role::CORE_TOOLS;

    #[test]
    fn core_registry_has_all_core_tools_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = core_registry(dir.path());
        assert_eq!(registry.names(), CORE_TOOLS.to_vec());
    }

    #[test]
    fn cap_output_keeps_short_text() {
        assert_eq!(cap_output("short", 10), "short");
        let capped = cap_output("abcdefghij", 4);
        assert!(capped.starts_with("abcd\n"));
        assert!(capped.contains("6 more characters"));
    }

    #[tokio::test]
    async fn registry_turns_tool_errors_into_text() {
        let dir = tempfile::tempdir().unwrap();
        let registry = core_registry(dir.path());
        let call = deputy_core::ToolCall::new(
            "call_1",
            "read_file",
            serde_json::json!({"path": "missing.txt"}),
        );
        let result = registry.execute(&call).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Error: Tool execution failed: read_file"));
    }
}
