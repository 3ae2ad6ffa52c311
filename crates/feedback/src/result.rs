//! Tri-state check outcomes and their summaries.

use serde::{Deserialize, Serialize};

/// The three external checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    TypeCheck,
    Tests,
    Lint,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [CheckKind::TypeCheck, CheckKind::Tests, CheckKind::Lint];

    pub fn label(self) -> &'static str {
        match self {
            Self::TypeCheck => "Type check",
            Self::Tests => "Tests",
            Self::Lint => "Lint",
        }
    }
}

/// Why a check did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The tool ran and reported real problems
    Violations,
    /// The tool is not installed
    ToolMissing,
    /// The tool is installed but the project has no configuration for it
    NotConfigured,
    /// Turned off in configuration
    Disabled,
    TimedOut,
    SpawnFailed,
}

/// Outcome of one check.
///
/// A skipped check is neither passed nor failed and never counts against
/// the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub passed: bool,
    pub skipped: bool,

    /// Failure output, capped; a short reason when skipped
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl FeedbackResult {
    pub fn passed() -> Self {
        Self {
            passed: true,
            skipped: false,
            output: String::new(),
            error_kind: None,
        }
    }

    pub fn failed(kind: ErrorKind, output: impl Into<String>) -> Self {
        Self {
            passed: false,
            skipped: false,
            output: output.into(),
            error_kind: Some(kind),
        }
    }

    pub fn skipped(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            skipped: true,
            output: reason.into(),
            error_kind: Some(kind),
        }
    }

    /// Passed or skipped.
    pub fn ok(&self) -> bool {
        self.passed || self.skipped
    }

    pub fn status(&self) -> &'static str {
        if self.passed {
            "passed"
        } else if self.skipped {
            "skipped"
        } else {
            "failed"
        }
    }

    /// `✓ Tests: passed`, `✗ Lint: failed`, `✓ Type check: skipped (...)`.
    pub fn summary_line(&self, kind: CheckKind) -> String {
        let mark = if self.ok() { "✓" } else { "✗" };
        let mut line = format!("{mark} {}: {}", kind.label(), self.status());
        if self.skipped && !self.output.is_empty() {
            line.push_str(&format!(" ({})", self.output));
        }
        line
    }
}

/// All three outcomes and the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackLoopResults {
    pub type_check: FeedbackResult,
    pub tests: FeedbackResult,
    pub lint: FeedbackResult,
    pub all_passed: bool,
}

impl FeedbackLoopResults {
    pub fn new(type_check: FeedbackResult, tests: FeedbackResult, lint: FeedbackResult) -> Self {
        let all_passed = type_check.ok() && tests.ok() && lint.ok();
        Self {
            type_check,
            tests,
            lint,
            all_passed,
        }
    }

    pub fn get(&self, kind: CheckKind) -> &FeedbackResult {
        match kind {
            CheckKind::TypeCheck => &self.type_check,
            CheckKind::Tests => &self.tests,
            CheckKind::Lint => &self.lint,
        }
    }

    /// One summary line per check.
    pub fn summary(&self) -> String {
        CheckKind::ALL
            .iter()
            .map(|kind| self.get(*kind).summary_line(*kind))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Summary plus the output of every failed check.
    pub fn report(&self) -> String {
        let mut out = self.summary();
        for kind in CheckKind::ALL {
            let result = self.get(kind);
            if !result.ok() && !result.output.is_empty() {
                out.push_str(&format!("\n\n--- {} output ---\n{}", kind.label(), result.output));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_counts_as_ok() {
        let skipped = FeedbackResult::skipped(ErrorKind::NotConfigured, "no eslint config");
        assert!(skipped.ok());
        assert!(!skipped.passed);
        let results =
            FeedbackLoopResults::new(FeedbackResult::passed(), FeedbackResult::passed(), skipped);
        assert!(results.all_passed);
    }

    #[test]
    fn any_failure_fails_aggregate() {
        let results = FeedbackLoopResults::new(
            FeedbackResult::passed(),
            FeedbackResult::failed(ErrorKind::Violations, "1 failing"),
            FeedbackResult::passed(),
        );
        assert!(!results.all_passed);
    }

    #[test]
    fn summary_lines() {
        let results = FeedbackLoopResults::new(
            FeedbackResult::passed(),
            FeedbackResult::failed(ErrorKind::Violations, "expected 2, got 3"),
            FeedbackResult::skipped(ErrorKind::ToolMissing, "eslint not installed"),
        );
        assert_eq!(
            results.summary(),
            "✓ Type check: passed\n✗ Tests: failed\n✓ Lint: skipped (eslint not installed)"
        );
        let report = results.report();
        assert!(report.contains("--- Tests output ---\nexpected 2, got 3"));
        assert!(!report.contains("--- Lint output ---"));
    }
}
