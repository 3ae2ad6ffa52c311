//! External validation feedback for deputy.
//!
//! Runs the project's type checker, test suite and linter as shell
//! commands. Each check ends passed, failed or skipped; a check whose tool
//! is missing or unconfigured is skipped and does not fail the aggregate.

pub mod result;
pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use deputy_config::FeedbackConfig;
use tracing::{debug, info};

pub use result::{CheckKind, ErrorKind, FeedbackLoopResults, FeedbackResult};
pub use runner::{CommandOutput, CommandRunner, RunError, ShellCommandRunner};

const DEFAULT_TYPE_CHECK_COMMAND: &str = "npx tsc --noEmit";
const DEFAULT_LINT_COMMAND: &str = "npx eslint .";
const FALLBACK_TEST_COMMAND: &str = "npm test";
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Launchers whose first argument is the program actually being run.
const LAUNCHERS: &[&str] = &["npx", "bunx", "pnpx", "pnpm", "yarn"];

/// Shells whose diagnostics report an unknown command.
const SHELL_PREFIXES: &[&str] = &["sh:", "bash:", "dash:", "zsh:", "/bin/sh:", "/bin/bash:"];

/// Output fragments meaning the project has no configuration for the tool.
const NOT_CONFIGURED_MARKERS: &[&str] = &[
    "no eslint configuration found",
    "couldn't find a configuration file",
    "couldn't find an eslint.config",
    "cannot find a tsconfig.json",
    "no inputs were found in config file",
    "error ts5058",
    "missing script: \"test\"",
    "missing script: test",
    "error: no test specified",
    "no test files found",
    "no tests found",
];

/// Runs the three checks against one working directory.
pub struct FeedbackAggregator {
    config: FeedbackConfig,
    working_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl FeedbackAggregator {
    pub fn new(config: FeedbackConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
            runner: Arc::new(ShellCommandRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Run all enabled checks concurrently.
    pub async fn run_all(&self) -> FeedbackLoopResults {
        let (type_check, tests, lint) =
            tokio::join!(self.run_type_check(), self.run_tests(), self.run_lint());
        let results = FeedbackLoopResults::new(type_check, tests, lint);
        info!(
            all_passed = results.all_passed,
            type_check = results.type_check.status(),
            tests = results.tests.status(),
            lint = results.lint.status(),
            "Feedback checks finished"
        );
        results
    }

    pub async fn run_type_check(&self) -> FeedbackResult {
        if !self.config.type_check {
            return disabled();
        }
        let command = self
            .config
            .type_check_command
            .as_deref()
            .unwrap_or(DEFAULT_TYPE_CHECK_COMMAND);
        self.run_check(CheckKind::TypeCheck, command).await
    }

    pub async fn run_tests(&self) -> FeedbackResult {
        if !self.config.tests {
            return disabled();
        }
        let command = self.select_test_command().await;
        self.run_check(CheckKind::Tests, &command).await
    }

    pub async fn run_lint(&self) -> FeedbackResult {
        if !self.config.lint {
            return disabled();
        }
        let command = self
            .config
            .lint_command
            .as_deref()
            .unwrap_or(DEFAULT_LINT_COMMAND);
        self.run_check(CheckKind::Lint, command).await
    }

    /// The configured test command, or the first runner in priority order
    /// that answers a version probe, or `npm test`.
    pub async fn select_test_command(&self) -> String {
        if let Some(command) = &self.config.test_command {
            return command.clone();
        }
        for runner in &self.config.test_runners {
            let (probe, command) = runner_commands(runner);
            match self.runner.run(&probe, &self.working_dir, PROBE_TIMEOUT).await {
                Ok(output) if output.success => {
                    debug!(runner = %runner, "Test runner selected");
                    return command;
                }
                _ => debug!(runner = %runner, "Test runner not available"),
            }
        }
        FALLBACK_TEST_COMMAND.into()
    }

    async fn run_check(&self, kind: CheckKind, command: &str) -> FeedbackResult {
        debug!(check = kind.label(), command = %command, "Running check");
        match self.runner.run(command, &self.working_dir, self.timeout()).await {
            Ok(output) => classify(&output, command, self.config.output_limit),
            Err(RunError::TimedOut { timeout_secs, .. }) => FeedbackResult::failed(
                ErrorKind::TimedOut,
                format!("{command} timed out after {timeout_secs}s"),
            ),
            Err(e @ RunError::Spawn { .. }) => {
                FeedbackResult::skipped(ErrorKind::SpawnFailed, e.to_string())
            }
        }
    }
}

fn disabled() -> FeedbackResult {
    FeedbackResult::skipped(ErrorKind::Disabled, "disabled")
}

/// Probe and run commands for a named test runner.
fn runner_commands(runner: &str) -> (String, String) {
    match runner {
        "bun" => ("bun --version".into(), "bun test".into()),
        "vitest" => (
            "npx --no-install vitest --version".into(),
            "npx vitest run".into(),
        ),
        "jest" => (
            "npx --no-install jest --version".into(),
            "npx jest".into(),
        ),
        other => (format!("{other} --version"), format!("{other} test")),
    }
}

/// Turn a finished `command` into a tri-state result.
///
/// Only diagnostics about the command's own program count as a missing
/// tool; a `not found` printed by the tests themselves is a failure.
pub fn classify(output: &CommandOutput, command: &str, output_limit: usize) -> FeedbackResult {
    if output.success {
        return FeedbackResult::passed();
    }

    let lower = output.output.to_lowercase();
    let programs = command_programs(command);
    if output.exit_code == Some(127)
        || lower.lines().any(|line| is_tool_missing_line(line.trim(), &programs))
    {
        return FeedbackResult::skipped(ErrorKind::ToolMissing, "tool not installed");
    }
    if NOT_CONFIGURED_MARKERS.iter().any(|m| lower.contains(m))
        || lower.lines().any(|line| is_missing_package_json(line.trim()))
    {
        return FeedbackResult::skipped(ErrorKind::NotConfigured, "no configuration");
    }

    FeedbackResult::failed(ErrorKind::Violations, cap(&output.output, output_limit))
}

/// The program a command runs, plus the one a launcher like `npx` runs.
fn command_programs(command: &str) -> Vec<String> {
    let mut tokens = command.split_whitespace();
    let Some(first) = tokens.next() else {
        return Vec::new();
    };
    let first = first.rsplit('/').next().unwrap_or(first).to_lowercase();
    let mut programs = vec![first.clone()];
    if LAUNCHERS.contains(&first.as_str())
        && let Some(target) = tokens.find(|t| !t.starts_with('-') && *t != "exec" && *t != "dlx")
    {
        programs.push(target.to_lowercase());
    }
    programs
}

fn is_tool_missing_line(line: &str, programs: &[String]) -> bool {
    if (line.starts_with("npm err") || line.starts_with("npm error"))
        && line.contains("could not determine executable to run")
    {
        return true;
    }
    programs.iter().any(|program| {
        let shell_says_missing = SHELL_PREFIXES.iter().any(|p| line.starts_with(p))
            && (line.contains(&format!(": {program}: not found"))
                || line.contains(&format!(": {program}: command not found"))
                || line.ends_with(&format!("command not found: {program}")));
        shell_says_missing
            || line.starts_with(&format!(
                "'{program}' is not recognized as an internal or external command"
            ))
    })
}

/// npm run outside a package: `npm ERR! enoent ... package.json`.
fn is_missing_package_json(line: &str) -> bool {
    (line.starts_with("npm err") || line.starts_with("npm error"))
        && line.contains("enoent")
        && line.contains("package.json")
}

fn cap(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Answers commands from a table; anything unlisted is "not found".
    struct StubRunner {
        responses: HashMap<String, CommandOutput>,
        seen: Mutex<Vec<String>>,
    }

    impl StubRunner {
        fn new(responses: &[(&str, CommandOutput)]) -> Self {
            Self {
                responses: responses
                    .iter()
                    .map(|(c, o)| (c.to_string(), o.clone()))
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for StubRunner {
        async fn run(
            &self,
            command: &str,
            _cwd: &Path,
            _timeout: Duration,
        ) -> Result<CommandOutput, RunError> {
            self.seen.lock().unwrap().push(command.to_string());
            Ok(self.responses.get(command).cloned().unwrap_or_else(|| {
                CommandOutput::failed(127, format!("sh: 1: {command}: not found"))
            }))
        }
    }

    fn aggregator(runner: StubRunner) -> (FeedbackAggregator, Arc<StubRunner>) {
        let runner = Arc::new(runner);
        let agg = FeedbackAggregator::new(FeedbackConfig::default(), "/tmp/project")
            .with_runner(runner.clone());
        (agg, runner)
    }

    #[tokio::test]
    async fn missing_lint_config_is_skipped_and_does_not_fail() {
        let (agg, _) = aggregator(StubRunner::new(&[
            (DEFAULT_TYPE_CHECK_COMMAND, CommandOutput::ok("")),
            ("bun --version", CommandOutput::ok("1.1.0")),
            ("bun test", CommandOutput::ok("12 pass")),
            (
                DEFAULT_LINT_COMMAND,
                CommandOutput::failed(
                    2,
                    "Oops! Something went wrong! :(\nESLint couldn't find an eslint.config.(js|mjs|cjs) file.",
                ),
            ),
        ]));
        let results = agg.run_all().await;
        assert!(results.lint.skipped);
        assert_eq!(results.lint.error_kind, Some(ErrorKind::NotConfigured));
        assert!(results.type_check.passed);
        assert!(results.tests.passed);
        assert!(results.all_passed);
    }

    #[tokio::test]
    async fn failing_test_fails_aggregate() {
        let (agg, _) = aggregator(StubRunner::new(&[
            (DEFAULT_TYPE_CHECK_COMMAND, CommandOutput::ok("")),
            ("bun --version", CommandOutput::ok("1.1.0")),
            (
                "bun test",
                CommandOutput::failed(1, "expect(received).toBe(expected)\n1 fail"),
            ),
            (DEFAULT_LINT_COMMAND, CommandOutput::ok("")),
        ]));
        let results = agg.run_all().await;
        assert!(!results.tests.passed);
        assert!(!results.tests.skipped);
        assert!(results.tests.output.contains("1 fail"));
        assert!(!results.all_passed);
        assert!(results.summary().contains("✗ Tests: failed"));
    }

    #[tokio::test]
    async fn probes_runners_in_priority_order() {
        let (agg, runner) = aggregator(StubRunner::new(&[
            ("npx --no-install vitest --version", CommandOutput::ok("vitest/1.6.0")),
            ("npx --no-install jest --version", CommandOutput::ok("29.7.0")),
        ]));
        assert_eq!(agg.select_test_command().await, "npx vitest run");
        assert_eq!(
            runner.seen(),
            vec!["bun --version", "npx --no-install vitest --version"]
        );
    }

    #[tokio::test]
    async fn falls_back_to_npm_test() {
        let (agg, _) = aggregator(StubRunner::new(&[]));
        assert_eq!(agg.select_test_command().await, FALLBACK_TEST_COMMAND);
    }

    #[tokio::test]
    async fn configured_test_command_skips_probing() {
        let runner = Arc::new(StubRunner::new(&[]));
        let config = FeedbackConfig {
            test_command: Some("make test".into()),
            ..FeedbackConfig::default()
        };
        let agg = FeedbackAggregator::new(config, "/tmp").with_runner(runner.clone());
        assert_eq!(agg.select_test_command().await, "make test");
        assert!(runner.seen().is_empty());
    }

    #[tokio::test]
    async fn disabled_checks_are_skipped_without_running() {
        let runner = Arc::new(StubRunner::new(&[]));
        let config = FeedbackConfig {
            type_check: false,
            tests: false,
            lint: false,
            ..FeedbackConfig::default()
        };
        let results = FeedbackAggregator::new(config, "/tmp")
            .with_runner(runner.clone())
            .run_all()
            .await;
        assert!(results.all_passed);
        assert_eq!(results.type_check.error_kind, Some(ErrorKind::Disabled));
        assert!(runner.seen().is_empty());
    }

    #[test]
    fn classify_missing_tool() {
        let result = classify(
            &CommandOutput::failed(127, "sh: 1: tsc: not found"),
            DEFAULT_TYPE_CHECK_COMMAND,
            2000,
        );
        assert!(result.skipped);
        assert_eq!(result.error_kind, Some(ErrorKind::ToolMissing));
    }

    #[test]
    fn classify_missing_launched_program() {
        let result = classify(
            &CommandOutput::failed(1, "npm ERR! could not determine executable to run"),
            DEFAULT_LINT_COMMAND,
            2000,
        );
        assert_eq!(result.error_kind, Some(ErrorKind::ToolMissing));

        let result = classify(
            &CommandOutput::failed(1, "bash: line 1: eslint: command not found"),
            "eslint .",
            2000,
        );
        assert_eq!(result.error_kind, Some(ErrorKind::ToolMissing));
    }

    #[test]
    fn enoent_inside_a_test_run_is_a_failure() {
        let output = "FAIL src/config.test.ts\n ● loads fixture\n ENOENT: no such file or directory, open 'fixture.json'\nTests: 1 failed";
        let result = classify(&CommandOutput::failed(1, output), "npx vitest run", 2000);
        assert!(!result.ok());
        assert_eq!(result.error_kind, Some(ErrorKind::Violations));
        assert!(result.output.contains("fixture.json"));
    }

    #[test]
    fn not_found_inside_a_test_run_is_a_failure() {
        let output = "FAIL api.test.ts\n  expected 200, got GET /users/42: not found\nTests: 1 failed";
        let result = classify(&CommandOutput::failed(1, output), "bun test", 2000);
        assert!(!result.ok());

        // a missing binary the tests shell out to is not the runner itself
        let output = "sh: 1: convert: not found\nTests: 1 failed";
        let result = classify(&CommandOutput::failed(1, output), "bun test", 2000);
        assert!(!result.ok());
    }

    #[test]
    fn missing_package_json_is_unconfigured() {
        let output = "npm ERR! code ENOENT\nnpm ERR! syscall open\nnpm ERR! enoent ENOENT: no such file or directory, open '/work/package.json'";
        let result = classify(&CommandOutput::failed(254, output), FALLBACK_TEST_COMMAND, 2000);
        assert!(result.skipped);
        assert_eq!(result.error_kind, Some(ErrorKind::NotConfigured));
    }

    #[test]
    fn classify_caps_failure_output() {
        let long = "E".repeat(5000);
        let result = classify(&CommandOutput::failed(1, long), "bun test", 2000);
        assert!(!result.ok());
        assert_eq!(result.output.chars().count(), 2000);
    }

    #[test]
    fn classify_missing_npm_script_as_unconfigured() {
        let result = classify(
            &CommandOutput::failed(1, "npm ERR! Missing script: \"test\""),
            FALLBACK_TEST_COMMAND,
            2000,
        );
        assert_eq!(result.error_kind, Some(ErrorKind::NotConfigured));
    }
}
