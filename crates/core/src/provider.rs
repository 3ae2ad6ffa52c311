//! Provider trait: the abstraction over completion-model backends.
//!
//! A Provider sends a neutral [`ProviderRequest`] to a completion endpoint
//! and returns the response as a neutral [`Turn`]. Protocol-specific shapes
//! live behind [`WireCodec`]; the loop and the role logic only ever see
//! `Turn`, `ToolCall` and `ToolResult`.
//!
//! Implementations: Anthropic Messages (block-structured), OpenAI-compatible
//! chat completions (message-structured), Gemini generateContent
//! (part-structured, no call ids).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ProviderError;
use crate::message::{ToolResult, Turn};

/// A request for one model turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,

    /// Role framing, sent the way each protocol expects system text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The full conversation so far
    pub turns: Vec<Turn>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tool schemas advertised to the model. Nothing outside this list can
    /// be requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.2
}

/// The (name, description, input schema) triple advertised for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub parameters: serde_json::Value,
}

/// One decoded model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The model's turn, normalized into text and tool-call parts
    pub turn: Turn,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Protocol stop reason, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The three wire-protocol families a provider can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Tool calls and results are content blocks correlated by id.
    Anthropic,
    /// Tool calls hang off the assistant message; each result is its own message.
    #[serde(rename = "openai")]
    OpenAi,
    /// Function-call parts without ids; results correlate by position.
    Gemini,
}

impl Protocol {
    /// Guess the protocol from a well-known provider name.
    pub fn infer(provider_name: &str) -> Self {
        match provider_name {
            "anthropic" => Self::Anthropic,
            "gemini" | "google" => Self::Gemini,
            _ => Self::OpenAi,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown protocol '{other}'")),
        }
    }
}

/// Translation between neutral turns and one wire protocol.
///
/// Codecs are pure: they never perform I/O, so every protocol shape can be
/// tested without a network.
pub trait WireCodec {
    /// Build the request body for the full conversation plus tool schemas.
    fn encode_request(&self, request: &ProviderRequest) -> serde_json::Value;

    /// Decode a response body into a neutral turn.
    ///
    /// Unparseable tool arguments never fail the decode; they produce a
    /// [`crate::message::ToolCall::malformed`] call instead.
    fn decode_response(&self, body: serde_json::Value)
    -> Result<ProviderResponse, ProviderError>;

    /// Encode one batch of tool results as the protocol's follow-up unit.
    fn encode_tool_results(&self, results: &[ToolResult]) -> serde_json::Value;
}

/// The core Provider trait.
///
/// Every completion backend implements this trait. The tool-call loop calls
/// `complete()` without knowing which protocol is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Send a request and get one complete model turn.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_inference() {
        assert_eq!(Protocol::infer("anthropic"), Protocol::Anthropic);
        assert_eq!(Protocol::infer("gemini"), Protocol::Gemini);
        assert_eq!(Protocol::infer("openrouter"), Protocol::OpenAi);
    }

    #[test]
    fn protocol_parse_roundtrip() {
        for p in [Protocol::Anthropic, Protocol::OpenAi, Protocol::Gemini] {
            assert_eq!(p.to_string().parse::<Protocol>().unwrap(), p);
        }
        assert!("smoke-signals".parse::<Protocol>().is_err());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "bash".into(),
            description: "Execute a shell command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("bash"));
        assert!(json.contains("command"));
    }
}
