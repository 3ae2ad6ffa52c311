//! Parallel fan-out of independent subagent tasks.
//!
//! All tasks start together on the current task's executor and share
//! nothing but the working directory. A failing or panicking task is
//! recorded as failed; its siblings keep running. Results are reported in
//! input order.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::subagent::{SubagentScheduler, SubagentTask};

/// The result of one fanned-out task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub name: String,
    pub success: bool,

    /// Final text, or the error text when `success` is false
    pub result: String,

    pub elapsed: Duration,
}

/// Every task's outcome in input order, plus total wall-clock time.
#[derive(Debug, Clone)]
pub struct FanoutReport {
    pub outcomes: Vec<TaskOutcome>,
    pub elapsed: Duration,
}

impl FanoutReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.outcomes.len()
    }

    /// Labeled sections, one per task, under a summary header.
    pub fn render(&self) -> String {
        let mut out = format!(
            "# Parallel subagents: {}/{} succeeded in {:.1}s\n",
            self.succeeded(),
            self.outcomes.len(),
            self.elapsed.as_secs_f64()
        );
        for outcome in &self.outcomes {
            let mark = if outcome.success { "✓" } else { "✗" };
            out.push_str(&format!(
                "\n## {mark} {} ({:.1}s)\n{}\n",
                outcome.name,
                outcome.elapsed.as_secs_f64(),
                outcome.result
            ));
        }
        out
    }
}

/// Run `run` once per task concurrently and collect outcomes in input order.
pub async fn fan_out<T, F, Fut>(tasks: Vec<T>, run: F) -> FanoutReport
where
    T: Named,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let started = Instant::now();
    let futures = tasks.into_iter().map(|task| {
        let name = task.name().to_string();
        let fut = run(task);
        async move {
            let task_started = Instant::now();
            let (success, result) = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(text)) => (true, text),
                Ok(Err(error)) => (false, error),
                Err(panic) => (false, format!("task panicked: {}", panic_message(&*panic))),
            };
            if !success {
                warn!(task = %name, error = %result, "Fan-out task failed");
            }
            TaskOutcome {
                name,
                success,
                result,
                elapsed: task_started.elapsed(),
            }
        }
    });

    let outcomes = join_all(futures).await;
    FanoutReport {
        outcomes,
        elapsed: started.elapsed(),
    }
}

/// Anything with a label for fan-out reports.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for SubagentTask {
    fn name(&self) -> &str {
        &self.name
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

/// Fans subagent tasks out through a shared scheduler.
#[derive(Clone)]
pub struct ParallelFanout {
    scheduler: Arc<SubagentScheduler>,
}

impl ParallelFanout {
    pub fn new(scheduler: Arc<SubagentScheduler>) -> Self {
        Self { scheduler }
    }

    pub async fn run(&self, tasks: Vec<SubagentTask>) -> FanoutReport {
        info!(tasks = tasks.len(), "Fanning out subagents");
        let report = fan_out(tasks, |task| {
            let scheduler = self.scheduler.clone();
            async move {
                scheduler
                    .spawn(&task)
                    .await
                    .map_err(|e| format!("Subagent error: {e}"))
            }
        })
        .await;
        info!(
            succeeded = report.succeeded(),
            total = report.outcomes.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Fan-out finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AgentSettings;
    use crate::test_helpers::{TaskKeyedProvider, full_registry};
    use deputy_providers::RoleRouter;
    use std::path::Path;

    fn fanout() -> ParallelFanout {
        let scheduler = SubagentScheduler::new(
            RoleRouter::uniform(Arc::new(TaskKeyedProvider), "mock-model"),
            AgentSettings::default(),
            "/tmp/project",
        )
        .with_registry_factory(Arc::new(|_: &Path| full_registry()));
        ParallelFanout::new(Arc::new(scheduler))
    }

    #[tokio::test]
    async fn failing_task_does_not_affect_siblings() {
        let report = fanout()
            .run(vec![
                SubagentTask::new("first", "task one"),
                SubagentTask::new("second", "task two will fail"),
                SubagentTask::new("third", "task three"),
            ])
            .await;

        let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        let flags: Vec<_> = report.outcomes.iter().map(|o| o.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(report.outcomes[0].result, "done: task one");
        assert!(report.outcomes[1].result.starts_with("Subagent error: "));
        assert_eq!(report.succeeded(), 2);
        assert!(!report.all_succeeded());
    }

    #[tokio::test]
    async fn panicking_task_is_isolated() {
        let report = fanout()
            .run(vec![
                SubagentTask::new("a", "fine"),
                SubagentTask::new("b", "panic now"),
                SubagentTask::new("c", "also fine"),
            ])
            .await;
        let flags: Vec<_> = report.outcomes.iter().map(|o| o.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert!(report.outcomes[1].result.contains("task panicked"));
        assert!(report.outcomes[1].result.contains("provider blew up"));
    }

    #[tokio::test]
    async fn output_follows_input_order_not_completion_order() {
        let report = fanout()
            .run(vec![
                SubagentTask::new("slow", "slow job"),
                SubagentTask::new("fast", "quick job"),
            ])
            .await;
        let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast"]);
        assert!(report.outcomes[0].elapsed >= report.outcomes[1].elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn tasks_run_concurrently() {
        let tasks = (0..5)
            .map(|i| SubagentTask::new(format!("t{i}"), "slow job"))
            .collect();
        let report = fanout().run(tasks).await;
        assert!(report.all_succeeded());

        let summed: Duration = report.outcomes.iter().map(|o| o.elapsed).sum();
        assert!(summed >= Duration::from_millis(250), "{summed:?}");
        // the paused clock only advances while every task is waiting
        assert!(report.elapsed < Duration::from_millis(100), "{:?}", report.elapsed);
        assert!(report.elapsed < summed);
    }

    #[test]
    fn render_labels_each_section() {
        let report = FanoutReport {
            outcomes: vec![
                TaskOutcome {
                    name: "lint".into(),
                    success: true,
                    result: "clean".into(),
                    elapsed: Duration::from_millis(1200),
                },
                TaskOutcome {
                    name: "docs".into(),
                    success: false,
                    result: "Subagent error: boom".into(),
                    elapsed: Duration::from_millis(300),
                },
            ],
            elapsed: Duration::from_millis(1210),
        };
        let text = report.render();
        assert!(text.starts_with("# Parallel subagents: 1/2 succeeded in 1.2s"));
        assert!(text.contains("## ✓ lint (1.2s)\nclean"));
        assert!(text.contains("## ✗ docs (0.3s)\nSubagent error: boom"));
        assert!(text.find("lint").unwrap() < text.find("docs").unwrap());
    }

    #[tokio::test]
    async fn generic_fan_out_over_plain_futures() {
        struct Job(&'static str);
        impl Named for Job {
            fn name(&self) -> &str {
                self.0
            }
        }
        let report = fan_out(vec![Job("ok"), Job("err")], |job| async move {
            if job.0 == "ok" {
                Ok("fine".to_string())
            } else {
                Err("bad".to_string())
            }
        })
        .await;
        assert_eq!(report.outcomes[0].result, "fine");
        assert_eq!(report.outcomes[1].result, "bad");
    }
}
