//! Completion-protocol adapters for deputy.
//!
//! All providers implement `deputy_core::Provider` and `deputy_core::WireCodec`.
//! The router resolves each agent role to a provider and model from
//! configuration.

pub mod anthropic;
pub mod gemini;
mod http;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryingProvider;
pub use router::{RoleRoute, RoleRouter, build_from_config};
