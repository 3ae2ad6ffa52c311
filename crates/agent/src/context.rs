//! Per-agent state: one role, one private conversation, one fixed tool set.

use std::sync::Arc;

use deputy_core::message::{Conversation, Turn};
use deputy_core::provider::ToolDefinition;
use deputy_core::role::{AgentRole, IterationCap};
use deputy_core::tool::ToolRegistry;

/// The state a single [`crate::ToolCallLoop`] run owns.
///
/// The tool set is narrowed to the role's capabilities when the context is
/// built and cannot be widened afterwards. Nothing here outlives the loop
/// that drives it.
pub struct AgentContext {
    id: String,
    role: AgentRole,
    conversation: Conversation,
    tools: Arc<ToolRegistry>,
    iteration_cap: IterationCap,
    iteration_count: u32,
}

impl AgentContext {
    /// Build a context for `role`, seeded with `task` as the first user turn.
    ///
    /// `available` may hold more tools than the role may see; only the
    /// role's capability set is kept.
    pub fn new(role: AgentRole, task: impl Into<String>, available: &ToolRegistry) -> Self {
        let short = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{role}-{}", &short[..8]),
            role,
            conversation: Conversation::seeded(task),
            tools: Arc::new(available.filtered(&role.capabilities())),
            iteration_cap: role.iteration_cap(),
            iteration_count: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Tighten an unbounded role's cap. A role's fixed cap is never raised.
    pub fn with_iteration_ceiling(mut self, ceiling: u32) -> Self {
        self.iteration_cap = match self.iteration_cap {
            IterationCap::Unbounded => IterationCap::Limited(ceiling),
            IterationCap::Limited(max) => IterationCap::Limited(max.min(ceiling)),
        };
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The schemas advertised to the model on every request.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    pub fn iteration_cap(&self) -> IterationCap {
        self.iteration_cap
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn cap_reached(&self) -> bool {
        self.iteration_cap.reached(self.iteration_count)
    }

    pub(crate) fn begin_iteration(&mut self) -> u32 {
        self.iteration_count += 1;
        self.iteration_count
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.conversation.push(turn);
    }
}
