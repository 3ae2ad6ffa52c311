//! # deputy core
//!
//! Domain types, traits, and error definitions for the deputy orchestration
//! engine. This crate has **no protocol or I/O knowledge**. It defines the
//! neutral model that the provider adapters, tools and agent loop all
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping completion protocols without touching the loop
//! - Easy testing with scripted providers and stub tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod role;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{AgentEvent, EventBus, Termination};
pub use message::{Conversation, ConversationId, Part, Role, ToolCall, ToolResult, Turn};
pub use provider::{
    Protocol, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage, WireCodec,
};
pub use role::{AgentRole, IterationCap};
pub use tool::{Tool, ToolRegistry};
