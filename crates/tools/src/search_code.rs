//! Regex code search across the working directory.

use async_trait::async_trait;
use deputy_core::error::ToolError;
use deputy_core::role::tool_names::SEARCH_CODE;
use deputy_core::tool::Tool;
use regex::RegexBuilder;
use std::path::{Path, PathBuf};

use crate::workspace::{Workspace, walk_files};

const MAX_MATCHES: usize = 200;
/// Matched lines longer than this are clipped in the output.
const MAX_LINE_CHARS: usize = 300;

pub struct SearchCodeTool {
    workspace: Workspace,
}

impl SearchCodeTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

/// `*.rs`, `.rs` and `rs` all select files by extension; anything else is
/// a file-name suffix.
fn matches_filter(path: &Path, filter: &str) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let suffix = filter.trim_start_matches('*');
    if !suffix.starts_with('.') && !suffix.contains('.') {
        return name.ends_with(&format!(".{suffix}"));
    }
    name.ends_with(suffix)
}

fn search(
    files: Vec<PathBuf>,
    regex: &regex::Regex,
    workspace: &Workspace,
) -> (Vec<String>, usize) {
    let mut hits = Vec::new();
    let mut total = 0usize;
    for file in files {
        // Binary and non-UTF-8 files are skipped
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        for (i, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                total += 1;
                if hits.len() < MAX_MATCHES {
                    let text: String = line.trim().chars().take(MAX_LINE_CHARS).collect();
                    hits.push(format!("{}:{}: {text}", workspace.display(&file), i + 1));
                }
            }
        }
    }
    (hits, total)
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        SEARCH_CODE
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression. Returns matches as 'path:line: text'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory or file to search (default '.')"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Only search files matching this extension or suffix, e.g. '*.rs'"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Ignore case (default false)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let pattern = arguments["pattern"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?;
        let path = arguments["path"].as_str().unwrap_or(".");
        let filter = arguments["file_pattern"].as_str().map(String::from);
        let case_insensitive = arguments["case_insensitive"].as_bool().unwrap_or(false);

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("invalid regex: {e}")))?;

        let target = self.workspace.resolve(SEARCH_CODE, path)?;
        let workspace = self.workspace.clone();

        let (hits, total) = tokio::task::spawn_blocking(move || {
            let files = if target.is_file() {
                vec![target]
            } else {
                walk_files(&target, true)?
            };
            let files = files
                .into_iter()
                .filter(|f| filter.as_deref().is_none_or(|flt| matches_filter(f, flt)))
                .collect();
            Ok::<_, std::io::Error>(search(files, &regex, &workspace))
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: SEARCH_CODE.into(),
            reason: e.to_string(),
        })?
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: SEARCH_CODE.into(),
            reason: format!("failed to search '{path}': {e}"),
        })?;

        if hits.is_empty() {
            return Ok(format!("No matches for '{pattern}'"));
        }

        let mut out = hits.join("\n");
        if total > hits.len() {
            out.push_str(&format!(
                "\n... {} more matches not shown; narrow the pattern or path",
                total - hits.len()
            ));
        }
        Ok(out)
    }
}
