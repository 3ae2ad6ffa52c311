//! Google Gemini `generateContent` provider.
//!
//! Gemini function calls carry no ids. Calls are given positional ids
//! (`call_0`, `call_1`, ...) on decode, and results are sent back as
//! `functionResponse` parts in the same order as the calls they answer.

use async_trait::async_trait;
use deputy_core::error::ProviderError;
use deputy_core::message::{Part, Role, ToolCall, ToolResult, Turn};
use deputy_core::provider::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::http;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Schema keywords the function-declaration endpoint rejects.
const UNSUPPORTED_SCHEMA_FIELDS: &[&str] = &[
    "additionalProperties",
    "oneOf",
    "anyOf",
    "allOf",
    "exclusiveMaximum",
    "exclusiveMinimum",
    "minimum",
    "maximum",
    "$schema",
    "$id",
    "$ref",
    "definitions",
    "patternProperties",
    "dependencies",
    "const",
    "if",
    "then",
    "else",
    "not",
    "contentMediaType",
    "contentEncoding",
];

/// Gemini native provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: http::build_client(300),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_api_contents(&self, turns: &[Turn]) -> Vec<Value> {
        let mut contents = Vec::with_capacity(turns.len());
        for turn in turns {
            match turn.role {
                Role::User => {
                    let results: Vec<ToolResult> = turn.tool_results_iter().cloned().collect();
                    if results.is_empty() {
                        contents.push(serde_json::json!({
                            "role": "user",
                            "parts": [{"text": turn.text()}],
                        }));
                    } else {
                        contents.push(self.encode_tool_results(&results));
                    }
                }
                Role::Assistant => {
                    let parts: Vec<Value> = turn
                        .parts
                        .iter()
                        .filter_map(|part| match part {
                            Part::Text { text } if !text.is_empty() => {
                                Some(serde_json::json!({"text": text}))
                            }
                            Part::ToolCall(call) => Some(serde_json::json!({
                                "functionCall": {
                                    "name": call.name,
                                    "args": if call.input.is_object() {
                                        call.input.clone()
                                    } else {
                                        serde_json::json!({})
                                    },
                                }
                            })),
                            _ => None,
                        })
                        .collect();
                    if !parts.is_empty() {
                        contents.push(serde_json::json!({"role": "model", "parts": parts}));
                    }
                }
            }
        }
        contents
    }

    fn to_function_declarations(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": sanitize_schema(t.parameters.clone()),
                })
            })
            .collect()
    }
}

/// Recursively drop schema keywords (and `x-` extensions) Gemini rejects.
pub fn sanitize_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (key, value) in map {
                if UNSUPPORTED_SCHEMA_FIELDS.contains(&key.as_str()) || key.starts_with("x-") {
                    continue;
                }
                sanitized.insert(key, sanitize_schema(value));
            }
            Value::Object(sanitized)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(sanitize_schema).collect()),
        other => other,
    }
}

impl WireCodec for GeminiProvider {
    fn encode_request(&self, request: &ProviderRequest) -> Value {
        let mut generation_config = serde_json::json!({"temperature": request.temperature});
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        let mut body = serde_json::json!({
            "contents": self.to_api_contents(&request.turns),
            "generationConfig": generation_config,
        });

        if let Some(ref sys) = request.system {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": sys}]});
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": Self::to_function_declarations(&request.tools)
            }]);
        }

        body
    }

    fn decode_response(&self, body: Value) -> Result<ProviderResponse, ProviderError> {
        let resp: GeminiResponse = serde_json::from_value(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Gemini response: {e}"))
        })?;

        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".into()))?;

        let mut parts = Vec::new();
        let mut call_index = 0usize;
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(call) = part.function_call {
                let id = format!("call_{call_index}");
                call_index += 1;
                let tool_call = match call.args {
                    Value::Object(_) => ToolCall::new(id, call.name, call.args),
                    Value::Null => ToolCall::new(id, call.name, serde_json::json!({})),
                    other => ToolCall::malformed(
                        id,
                        call.name,
                        format!("expected an object, got {other}"),
                    ),
                };
                parts.push(Part::ToolCall(tool_call));
            } else if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                parts.push(Part::Text { text });
            }
        }

        let usage = resp.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            turn: Turn::new(Role::Assistant, parts),
            usage,
            model: resp.model_version.unwrap_or_default(),
            stop_reason: candidate.finish_reason,
        })
    }

    /// A single user content holding one `functionResponse` per result, in
    /// call order.
    fn encode_tool_results(&self, results: &[ToolResult]) -> Value {
        let parts: Vec<Value> = results
            .iter()
            .map(|r| {
                let response = if r.is_error {
                    serde_json::json!({"error": r.content})
                } else {
                    serde_json::json!({"content": r.content})
                };
                serde_json::json!({
                    "functionResponse": {"name": r.name, "response": response}
                })
            })
            .collect();
        serde_json::json!({"role": "user", "parts": parts})
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = self.encode_request(&request);

        debug!(provider = "gemini", model = %request.model, turns = request.turns.len(), "Sending completion request");

        let builder = self.client.post(&url).header("x-goog-api-key", &self.api_key);
        let response = http::post_json(&self.name, builder, &body).await?;
        let mut decoded = self.decode_response(response)?;
        if decoded.model.is_empty() {
            decoded.model = request.model;
        }
        Ok(decoded)
    }
}

// --- Gemini API types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
