//! Turn and conversation domain types.
//!
//! These are the neutral value objects every provider adapter translates to
//! and from. Nothing downstream of an adapter ever sees a wire-format field
//! name: a model response is a [`Turn`] made of [`Part`]s, and tool output
//! travels back as [`ToolResult`] parts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the exchange produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Solicited input: the task, or a batch of tool results.
    User,
    /// A model response.
    Assistant,
}

/// A structured request from the model to invoke a named capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id. Protocols without ids get a positional id from the adapter.
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Decoded structured input
    pub input: serde_json::Value,

    /// Set when the adapter could not decode the arguments. The loop answers
    /// such a call with an error result instead of executing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            malformed: None,
        }
    }

    /// A call whose arguments failed to parse.
    pub fn malformed(
        id: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: serde_json::Value::Null,
            malformed: Some(reason.into()),
        }
    }
}

/// The outcome of one tool call. Always text once past the executor boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call this result answers
    pub call_id: String,

    /// Tool name (needed by protocols that correlate by position + name)
    pub name: String,

    /// Output text or a human-readable error string
    pub content: String,

    /// Whether the content describes a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// One element of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// One unit of model output or solicited input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            timestamp: Utc::now(),
        }
    }

    /// A user turn carrying plain text (typically the task).
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::Text { text: text.into() }])
    }

    /// An assistant turn carrying plain text.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Part::Text { text: text.into() }])
    }

    /// The follow-up unit answering every call of the previous turn.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::new(
            Role::User,
            results.into_iter().map(Part::ToolResult).collect(),
        )
    }

    /// Concatenated text parts, newline separated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool calls in the order they appear in the turn.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::ToolCall(_)))
    }

    /// Tool results in the order they appear in the turn.
    pub fn tool_results_iter(&self) -> impl Iterator<Item = &ToolResult> {
        self.parts.iter().filter_map(|p| match p {
            Part::ToolResult(result) => Some(result),
            _ => None,
        })
    }
}

/// An ordered, append-only sequence of turns owned by one agent context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    turns: Vec<Turn>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// A conversation seeded with the task as its single user turn.
    pub fn seeded(task: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Turn::user(task));
        conv
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
