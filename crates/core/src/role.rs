//! Agent roles and their fixed capability sets.
//!
//! Each role is a fixed tuple of (advertised tool names, iteration cap). The
//! table is static: nothing can add a tool to a role after construction, and
//! only [`AgentRole::Main`] is ever shown the meta-tools that spawn other
//! agents, so delegation depth is capped at one level.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Well-known tool names.
pub mod tool_names {
    pub const READ_FILE: &str = "read_file";
    pub const LIST_FILES: &str = "list_files";
    pub const SEARCH_CODE: &str = "search_code";
    pub const EDIT_FILE: &str = "edit_file";
    pub const BASH: &str = "bash";

    pub const CONSULT_ORACLE: &str = "consult_oracle";
    pub const CODEBASE_SEARCH: &str = "codebase_search";
    pub const CONSULT_LIBRARIAN: &str = "consult_librarian";
    pub const SPAWN_SUBAGENT: &str = "spawn_subagent";
    pub const PARALLEL_SUBAGENTS: &str = "parallel_subagents";
}

use tool_names::*;

/// Core tools that never modify anything.
pub const READ_ONLY_TOOLS: &[&str] = &[READ_FILE, LIST_FILES, SEARCH_CODE];

/// The full read/write core tool set.
pub const CORE_TOOLS: &[&str] = &[READ_FILE, LIST_FILES, SEARCH_CODE, EDIT_FILE, BASH];

/// Tools that delegate to another agent. Main only.
pub const META_TOOLS: &[&str] = &[
    CONSULT_ORACLE,
    CODEBASE_SEARCH,
    CONSULT_LIBRARIAN,
    SPAWN_SUBAGENT,
    PARALLEL_SUBAGENTS,
];

/// Maximum number of model round trips a loop may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationCap {
    /// Bounded only by the model converging.
    Unbounded,
    Limited(u32),
}

impl IterationCap {
    /// Whether `count` completed iterations exhaust this cap.
    pub fn reached(self, count: u32) -> bool {
        match self {
            Self::Unbounded => false,
            Self::Limited(max) => count >= max,
        }
    }

    pub fn limit(self) -> Option<u32> {
        match self {
            Self::Unbounded => None,
            Self::Limited(max) => Some(max),
        }
    }
}

impl std::fmt::Display for IterationCap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Limited(max) => write!(f, "{max}"),
        }
    }
}

/// The kind of agent a context runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// The top-level agent driving the user's task.
    Main,
    /// Read-only reasoning consultant.
    Oracle,
    /// Read-only codebase search, tuned for many parallel calls.
    Search,
    /// Read-only documentation and reference research.
    Librarian,
    /// Isolated worker with full read/write core tools.
    Subagent,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Main,
        AgentRole::Oracle,
        AgentRole::Search,
        AgentRole::Librarian,
        AgentRole::Subagent,
    ];

    /// The tool names this role is allowed to see, in advertisement order.
    pub fn capabilities(self) -> Vec<&'static str> {
        match self {
            Self::Main => CORE_TOOLS.iter().chain(META_TOOLS).copied().collect(),
            Self::Oracle | Self::Search | Self::Librarian => READ_ONLY_TOOLS.to_vec(),
            Self::Subagent => CORE_TOOLS.to_vec(),
        }
    }

    pub fn iteration_cap(self) -> IterationCap {
        match self {
            Self::Main | Self::Oracle => IterationCap::Unbounded,
            Self::Search => IterationCap::Limited(10),
            Self::Librarian => IterationCap::Limited(15),
            Self::Subagent => IterationCap::Limited(20),
        }
    }

    /// Only Main may spawn other agents.
    pub fn may_delegate(self) -> bool {
        matches!(self, Self::Main)
    }

    /// Display label used in delegate error strings ("Oracle error: ...").
    pub fn label(self) -> &'static str {
        match self {
            Self::Main => "Main",
            Self::Oracle => "Oracle",
            Self::Search => "Search",
            Self::Librarian => "Librarian",
            Self::Subagent => "Subagent",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Oracle => "oracle",
            Self::Search => "search",
            Self::Librarian => "librarian",
            Self::Subagent => "subagent",
        };
        f.write_str(name)
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "oracle" => Ok(Self::Oracle),
            "search" => Ok(Self::Search),
            "librarian" => Ok(Self::Librarian),
            "subagent" => Ok(Self::Subagent),
            other => Err(format!("unknown agent role '{other}'")),
        }
    }
}
