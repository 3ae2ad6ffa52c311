//! Orchestration event system: progress reporting without console coupling.
//!
//! The loop, the scheduler and the fan-out publish events as they work.
//! Renderers and tests subscribe to react without the core ever printing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::role::AgentRole;

/// Why a tool-call loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model produced a turn without tool calls.
    Converged,
    /// The role's iteration cap was reached first.
    Exhausted,
    /// A stop was requested between iterations.
    Interrupted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Converged => "converged",
            Self::Exhausted => "exhausted",
            Self::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// All orchestration events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// A loop is about to ask the model for its next turn
    IterationStarted {
        agent: String,
        role: AgentRole,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// The model answered
    ModelResponded {
        agent: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool call is about to run
    ToolCallStarted {
        agent: String,
        call_id: String,
        tool_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool call produced its result
    ToolCallFinished {
        agent: String,
        call_id: String,
        tool_name: String,
        is_error: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A loop stopped
    LoopTerminated {
        agent: String,
        role: AgentRole,
        iterations: u32,
        reason: Termination,
        timestamp: DateTime<Utc>,
    },

    /// A delegate agent was spawned
    DelegateStarted {
        agent: String,
        role: AgentRole,
        label: String,
        timestamp: DateTime<Utc>,
    },

    /// A delegate agent returned (or failed)
    DelegateFinished {
        agent: String,
        role: AgentRole,
        label: String,
        success: bool,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for orchestration events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Publishing with no subscribers is a no-op.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(AgentEvent::ToolCallFinished {
            agent: "main".into(),
            call_id: "c1".into(),
            tool_name: "bash".into(),
            is_error: false,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            AgentEvent::ToolCallFinished {
                tool_name,
                is_error,
                ..
            } => {
                assert_eq!(tool_name, "bash");
                assert!(!is_error);
            }
            _ => panic!("Expected ToolCallFinished event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(AgentEvent::LoopTerminated {
            agent: "main".into(),
            role: AgentRole::Main,
            iterations: 1,
            reason: Termination::Converged,
            timestamp: Utc::now(),
        });
    }
}
