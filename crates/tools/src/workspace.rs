//! Working-directory sandbox shared by the file tools.
//!
//! Every path a tool receives is resolved against the workspace root and
//! lexically normalized. Anything that lands outside the root is refused.

use deputy_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Directory names never descended into when listing or searching.
pub const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target", ".deputy"];

/// The directory a set of tools is scoped to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` (relative to the root, or absolute inside it).
    pub fn resolve(&self, tool_name: &str, path: &str) -> Result<PathBuf, ToolError> {
        let joined = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.root.join(path)
        };

        let normalized = normalize(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(ToolError::PermissionDenied {
                tool_name: tool_name.into(),
                reason: format!("path '{path}' is outside the working directory"),
            });
        }
        Ok(normalized)
    }

    /// Path relative to the root, for display.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Collect files under `dir` in sorted order, skipping [`IGNORED_DIRS`].
pub fn walk_files(dir: &Path, recursive: bool) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_into(dir, recursive, &mut files)?;
    Ok(files)
}

fn walk_into(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            let name = entry.file_name();
            if IGNORED_DIRS.iter().any(|d| name == *d) {
                continue;
            }
            if recursive {
                walk_into(&path, recursive, out)?;
            } else {
                out.push(path);
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}
