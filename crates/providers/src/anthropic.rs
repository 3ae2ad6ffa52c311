//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks,
//!   correlated by explicit id

use async_trait::async_trait;
use deputy_core::error::ProviderError;
use deputy_core::message::{Part, Role, ToolCall, ToolResult, Turn};
use deputy_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: http::build_client(300),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert neutral turns to Anthropic messages with content blocks.
    fn to_api_messages(&self, turns: &[Turn]) -> Vec<serde_json::Value> {
        let mut result = Vec::new();

        for turn in turns {
            match turn.role {
                Role::User => {
                    let results: Vec<ToolResult> = turn.tool_results_iter().cloned().collect();
                    if results.is_empty() {
                        result.push(serde_json::json!(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Text(turn.text()),
                        }));
                    } else {
                        result.push(self.encode_tool_results(&results));
                    }
                }
                Role::Assistant => {
                    if !turn.has_tool_calls() {
                        result.push(serde_json::json!(AnthropicMessage {
                            role: "assistant".into(),
                            content: AnthropicContent::Text(turn.text()),
                        }));
                        continue;
                    }
                    let blocks: Vec<ContentBlock> = turn
                        .parts
                        .iter()
                        .filter_map(|part| match part {
                            Part::Text { text } if !text.is_empty() => {
                                Some(ContentBlock::Text { text: text.clone() })
                            }
                            Part::ToolCall(call) => Some(ContentBlock::ToolUse {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                input: if call.input.is_object() {
                                    call.input.clone()
                                } else {
                                    serde_json::json!({})
                                },
                            }),
                            _ => None,
                        })
                        .collect();
                    result.push(serde_json::json!(AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Blocks(blocks),
                    }));
                }
            }
        }

        result
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    /// Turn one `tool_use` block into a neutral call.
    fn decode_tool_use(id: String, name: String, input: serde_json::Value) -> ToolCall {
        match input {
            serde_json::Value::Object(_) => ToolCall::new(id, name, input),
            serde_json::Value::Null => ToolCall::new(id, name, serde_json::json!({})),
            // Some proxies forward the input as a JSON string
            serde_json::Value::String(raw) => match http::parse_arguments(&raw) {
                Ok(value) => ToolCall::new(id, name, value),
                Err(reason) => ToolCall::malformed(id, name, reason),
            },
            other => ToolCall::malformed(id, name, format!("expected an object, got {other}")),
        }
    }
}

impl WireCodec for AnthropicProvider {
    fn encode_request(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": self.to_api_messages(&request.turns),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });

        if let Some(ref sys) = request.system {
            body["system"] = serde_json::json!(sys);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    fn decode_response(
        &self,
        body: serde_json::Value,
    ) -> Result<ProviderResponse, ProviderError> {
        let resp: AnthropicResponse = serde_json::from_value(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let parts = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(Part::Text { text }),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    Some(Part::ToolCall(Self::decode_tool_use(id, name, input)))
                }
                ResponseContentBlock::Other => None,
            })
            .collect();

        Ok(ProviderResponse {
            turn: Turn::new(Role::Assistant, parts),
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
            model: resp.model,
            stop_reason: resp.stop_reason,
        })
    }

    fn encode_tool_results(&self, results: &[ToolResult]) -> serde_json::Value {
        let blocks: Vec<ContentBlock> = results
            .iter()
            .map(|r| ContentBlock::ToolResult {
                tool_use_id: r.call_id.clone(),
                content: r.content.clone(),
                is_error: r.is_error,
            })
            .collect();
        serde_json::json!(AnthropicMessage {
            role: "user".into(),
            content: AnthropicContent::Blocks(blocks),
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.encode_request(&request);

        debug!(provider = "anthropic", model = %request.model, turns = request.turns.len(), "Sending completion request");

        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let response = http::post_json(&self.name, builder, &body).await?;
        self.decode_response(response)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Thinking and other block kinds carry nothing the loop consumes.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
