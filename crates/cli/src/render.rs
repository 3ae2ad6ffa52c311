//! Plain-text progress rendering of orchestration events on stderr.

use std::sync::Arc;

use deputy_core::event::{AgentEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Print every event published on `events` until aborted.
pub fn spawn(events: Arc<EventBus>) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        eprintln!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("  ... {skipped} events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// One progress line per event, or `None` for events not worth showing.
pub fn describe(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::IterationStarted {
            agent, iteration, ..
        } => Some(format!("  [{agent}] step {iteration}")),
        AgentEvent::ToolCallStarted {
            agent, tool_name, ..
        } => Some(format!("  [{agent}]   → {tool_name}")),
        AgentEvent::ToolCallFinished {
            agent,
            tool_name,
            is_error: true,
            duration_ms,
            ..
        } => Some(format!("  [{agent}]   ✗ {tool_name} ({duration_ms}ms)")),
        AgentEvent::ToolCallFinished { .. } | AgentEvent::ModelResponded { .. } => None,
        AgentEvent::LoopTerminated {
            agent,
            iterations,
            reason,
            ..
        } => Some(format!("  [{agent}] {reason} after {iterations} steps")),
        AgentEvent::DelegateStarted { role, label, .. } => {
            Some(format!("  ⇢ {role}: {label}"))
        }
        AgentEvent::DelegateFinished {
            role,
            label,
            success,
            elapsed_ms,
            ..
        } => {
            let mark = if *success { "✓" } else { "✗" };
            Some(format!(
                "  {mark} {role}: {label} ({:.1}s)",
                *elapsed_ms as f64 / 1000.0
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deputy_core::event::Termination;
    use deputy_core::role::AgentRole;

    #[test]
    fn describes_termination_and_delegates() {
        let now = chrono_now();
        let line = describe(&AgentEvent::LoopTerminated {
            agent: "subagent-1234".into(),
            role: AgentRole::Subagent,
            iterations: 20,
            reason: Termination::Exhausted,
            timestamp: now,
        })
        .unwrap();
        assert_eq!(line, "  [subagent-1234] exhausted after 20 steps");

        let line = describe(&AgentEvent::DelegateFinished {
            agent: "oracle-1".into(),
            role: AgentRole::Oracle,
            label: "oracle".into(),
            success: false,
            elapsed_ms: 2500,
            timestamp: now,
        })
        .unwrap();
        assert_eq!(line, "  ✗ oracle: oracle (2.5s)");
    }

    #[test]
    fn successful_tool_calls_are_quiet() {
        let event = AgentEvent::ToolCallFinished {
            agent: "main-1".into(),
            call_id: "c".into(),
            tool_name: "read_file".into(),
            is_error: false,
            duration_ms: 3,
            timestamp: chrono_now(),
        };
        assert!(describe(&event).is_none());
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
