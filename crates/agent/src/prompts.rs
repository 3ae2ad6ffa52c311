//! Role prompt templates.
//!
//! Each role gets a fixed framing. The Librarian's prompt additionally
//! depends on what kind of question it was asked.

use std::path::Path;

use deputy_core::role::AgentRole;
use serde::{Deserialize, Serialize};

const MAIN_PROMPT: &str = concat!(
    "You are deputy, a software engineering agent working directly in the user's repository. ",
    "Use the core tools to read, search, edit and run code. ",
    "Delegate when it helps: consult_oracle for careful reasoning about hard problems, ",
    "codebase_search to locate code, consult_librarian for documentation and library usage, ",
    "spawn_subagent or parallel_subagents for self-contained work that would clutter your context. ",
    "Delegates see only the task you give them, so make each task complete on its own. ",
    "Parallel subagents must work on disjoint files. ",
    "When the task is done, reply with a short summary and no tool calls.",
);

const ORACLE_PROMPT: &str = concat!(
    "You are the oracle, a senior engineer consulted for analysis and advice. ",
    "You can read and search the code but cannot change it. ",
    "Investigate until you are confident, then answer with a clear recommendation ",
    "and the reasoning behind it. Point at specific files and lines.",
);

const SEARCH_PROMPT: &str = concat!(
    "You are a fast codebase search agent. ",
    "Issue many tool calls per turn: search for several names, patterns and paths at once ",
    "rather than one at a time. You have a small iteration budget, so be broad early. ",
    "Answer with the relevant file paths and line numbers and a one-line note for each.",
);

const LIBRARIAN_PROMPT: &str = concat!(
    "You are the librarian, a research agent for documentation, APIs and library usage. ",
    "You can read and search the repository, including vendored dependencies and docs. ",
    "Cite where each fact comes from.",
);

const SUBAGENT_PROMPT: &str = concat!(
    "You are a subagent given one self-contained task. ",
    "You have full read/write access to the working directory but cannot delegate. ",
    "Complete the task, verify it when you can, and finish with a concise report of what you changed. ",
    "Your report is all the caller will see.",
);

/// The system prompt for `role`.
///
/// `system_context` is project framing and is only given to Main.
pub fn system_prompt(role: AgentRole, working_dir: &Path, system_context: Option<&str>) -> String {
    let base = match role {
        AgentRole::Main => MAIN_PROMPT,
        AgentRole::Oracle => ORACLE_PROMPT,
        AgentRole::Search => SEARCH_PROMPT,
        AgentRole::Librarian => LIBRARIAN_PROMPT,
        AgentRole::Subagent => SUBAGENT_PROMPT,
    };

    let mut prompt = format!(
        "{base}\n\n## Environment\nWorking directory: {}\nAll tool paths are relative to it.",
        working_dir.display()
    );

    if role == AgentRole::Main
        && let Some(context) = system_context.map(str::trim).filter(|c| !c.is_empty())
    {
        prompt.push_str("\n\n## Project Context\n");
        prompt.push_str(context);
    }

    prompt
}

/// The Librarian prompt, specialized for one kind of question.
pub fn librarian_prompt(kind: RequestKind, working_dir: &Path) -> String {
    format!(
        "{}\n\n## Request Type: {}\n{}",
        system_prompt(AgentRole::Librarian, working_dir, None),
        kind.label(),
        kind.guidance()
    )
}

/// What kind of answer a Librarian question is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Conceptual,
    Implementation,
    Examples,
    Troubleshooting,
}

const TROUBLESHOOTING_KEYWORDS: &[&str] = &[
    "error", "bug", "fail", "broken", "crash", "not working", "doesn't work", "issue", "fix",
    "debug", "exception",
];
const EXAMPLES_KEYWORDS: &[&str] = &[
    "example", "sample", "snippet", "show me", "demo", "usage of",
];
const IMPLEMENTATION_KEYWORDS: &[&str] = &[
    "how do i", "how to", "implement", "build", "create", "set up", "setup", "configure",
    "integrate", "add ",
];

impl RequestKind {
    pub const ALL: [RequestKind; 4] = [
        RequestKind::Conceptual,
        RequestKind::Implementation,
        RequestKind::Examples,
        RequestKind::Troubleshooting,
    ];

    /// Classify a question by keyword. Conceptual is the fallback.
    pub fn classify(question: &str) -> Self {
        let q = question.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| q.contains(w));
        if any(TROUBLESHOOTING_KEYWORDS) {
            Self::Troubleshooting
        } else if any(EXAMPLES_KEYWORDS) {
            Self::Examples
        } else if any(IMPLEMENTATION_KEYWORDS) {
            Self::Implementation
        } else {
            Self::Conceptual
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Conceptual => "conceptual",
            Self::Implementation => "implementation",
            Self::Examples => "examples",
            Self::Troubleshooting => "troubleshooting",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            Self::Conceptual => {
                "Explain the underlying concepts and how the pieces fit together. Prefer clarity over exhaustive detail."
            }
            Self::Implementation => {
                "Give concrete, step-by-step implementation guidance that fits this codebase's existing conventions."
            }
            Self::Examples => {
                "Find and present working code examples, from this repository first, with a short note on each."
            }
            Self::Troubleshooting => {
                "Identify the likely causes of the problem, how to confirm each one, and the fix."
            }
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown request type '{s}'"))
    }
}
