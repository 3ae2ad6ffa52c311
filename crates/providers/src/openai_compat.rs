//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/chat/completions`.
//!
//! Tool calls hang off the assistant message with their arguments encoded as
//! a JSON string; each tool result travels back as its own `tool` message
//! keyed by `tool_call_id`.

use async_trait::async_trait;
use deputy_core::error::ProviderError;
use deputy_core::message::{Part, Role, ToolCall, ToolResult, Turn};
use deputy_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http::build_client(120),
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert the system prompt plus neutral turns to OpenAI messages.
    fn to_api_messages(&self, system: Option<&str>, turns: &[Turn]) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(turns.len() + 1);

        if let Some(sys) = system {
            messages.push(serde_json::json!(ApiMessage {
                role: "system".into(),
                content: Some(sys.to_string()),
                tool_calls: None,
                tool_call_id: None,
            }));
        }

        for turn in turns {
            match turn.role {
                Role::User => {
                    let results: Vec<ToolResult> = turn.tool_results_iter().cloned().collect();
                    if results.is_empty() {
                        messages.push(serde_json::json!(ApiMessage {
                            role: "user".into(),
                            content: Some(turn.text()),
                            tool_calls: None,
                            tool_call_id: None,
                        }));
                    } else if let serde_json::Value::Array(encoded) =
                        self.encode_tool_results(&results)
                    {
                        messages.extend(encoded);
                    }
                }
                Role::Assistant => {
                    let calls = turn.tool_calls();
                    let text = turn.text();
                    messages.push(serde_json::json!(ApiMessage {
                        role: "assistant".into(),
                        content: if text.is_empty() && !calls.is_empty() {
                            None
                        } else {
                            Some(text)
                        },
                        tool_calls: if calls.is_empty() {
                            None
                        } else {
                            Some(calls.into_iter().map(Self::to_api_tool_call).collect())
                        },
                        tool_call_id: None,
                    }));
                }
            }
        }

        messages
    }

    fn to_api_tool_call(call: &ToolCall) -> ApiToolCall {
        let arguments = if call.input.is_null() {
            "{}".to_string()
        } else {
            call.input.to_string()
        };
        ApiToolCall {
            id: call.id.clone(),
            r#type: "function".into(),
            function: ApiFunction {
                name: call.name.clone(),
                arguments,
            },
        }
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

impl WireCodec for OpenAiCompatProvider {
    fn encode_request(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": self.to_api_messages(request.system.as_deref(), &request.turns),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
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
        let api_response: ApiResponse = serde_json::from_value(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {e}"))
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let mut parts = Vec::new();
        if let Some(content) = choice.message.content.filter(|c| !c.is_empty()) {
            parts.push(Part::Text { text: content });
        }
        for tc in choice.message.tool_calls.unwrap_or_default() {
            let call = match http::parse_arguments(&tc.function.arguments) {
                Ok(input) => ToolCall::new(tc.id, tc.function.name, input),
                Err(reason) => ToolCall::malformed(tc.id, tc.function.name, reason),
            };
            parts.push(Part::ToolCall(call));
        }

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            turn: Turn::new(Role::Assistant, parts),
            usage,
            model: api_response.model,
            stop_reason: choice.finish_reason,
        })
    }

    /// One `tool` message per result, returned as a JSON array.
    fn encode_tool_results(&self, results: &[ToolResult]) -> serde_json::Value {
        serde_json::Value::Array(
            results
                .iter()
                .map(|r| {
                    serde_json::json!(ApiMessage {
                        role: "tool".into(),
                        content: Some(r.content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(r.call_id.clone()),
                    })
                })
                .collect(),
        )
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.encode_request(&request);

        debug!(provider = %self.name, model = %request.model, turns = request.turns.len(), "Sending completion request");

        let builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key));

        let response = http::post_json(&self.name, builder, &body).await?;
        self.decode_response(response)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::openai("sk-test")
    }

    #[test]
    fn convenience_constructors() {
        assert_eq!(provider().name(), "openai");
        assert_eq!(provider().base_url, "https://api.openai.com/v1");
        let ollama = OpenAiCompatProvider::ollama(None);
        assert_eq!(ollama.base_url, "http://localhost:11434/v1");
        let router = OpenAiCompatProvider::openrouter("sk-or");
        assert_eq!(router.name(), "openrouter");
    }

    #[test]
    fn system_prompt_is_first_message() {
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            system: Some("You search code".into()),
            turns: vec![Turn::user("find the parser")],
            temperature: 0.2,
            max_tokens: Some(1024),
            tools: vec![],
        };
        let body = provider().encode_request(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You search code");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn tool_calls_encode_arguments_as_string() {
        let turn = Turn::new(
            Role::Assistant,
            vec![Part::ToolCall(ToolCall::new(
                "call_abc",
                "read_file",
                serde_json::json!({"path": "foo.txt"}),
            ))],
        );
        let messages = provider().to_api_messages(None, &[turn]);
        let msg = &messages[0];
        assert!(msg["content"].is_null());
        let tc = &msg["tool_calls"][0];
        assert_eq!(tc["id"], "call_abc");
        assert_eq!(tc["type"], "function");
        let args: serde_json::Value =
            serde_json::from_str(tc["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["path"], "foo.txt");
    }

    #[test]
    fn each_tool_result_is_its_own_message() {
        let a = ToolCall::new("call_1", "read_file", serde_json::json!({}));
        let b = ToolCall::new("call_2", "list_files", serde_json::json!({}));
        let turns = vec![Turn::tool_results(vec![
            ToolResult::success(&a, "alpha"),
            ToolResult::success(&b, "beta"),
        ])];
        let messages = provider().to_api_messages(None, &turns);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "tool");
        assert_eq!(messages[0]["tool_call_id"], "call_1");
        assert_eq!(messages[1]["tool_call_id"], "call_2");
        assert_eq!(messages[1]["content"], "beta");
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "bash".into(),
            description: "Run a shell command".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools[0].r#type, "function");
        assert_eq!(api_tools[0].function.name, "bash");
    }

    #[test]
    fn parse_tool_call_response() {
        let body = serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "read_file", "arguments": "{\"path\":\"a.rs\"}"}},
                        {"id": "call_2", "type": "function",
                         "function": {"name": "list_files", "arguments": ""}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
        });
        let pr = provider().decode_response(body).unwrap();
        let calls = pr.turn.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].input["path"], "a.rs");
        assert_eq!(calls[1].input, serde_json::json!({}));
        assert_eq!(pr.usage.unwrap().total_tokens, 20);
        assert_eq!(pr.stop_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn unparseable_arguments_become_malformed_call() {
        let body = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "content": "editing",
                    "tool_calls": [
                        {"id": "call_x", "type": "function",
                         "function": {"name": "edit_file", "arguments": "{\"path\": "}}
                    ]
                }
            }]
        });
        let pr = provider().decode_response(body).unwrap();
        assert_eq!(pr.turn.text(), "editing");
        let calls = pr.turn.tool_calls();
        assert_eq!(calls[0].id, "call_x");
        assert!(calls[0].malformed.is_some());
    }

    #[test]
    fn empty_choices_is_invalid_response() {
        let err = provider()
            .decode_response(serde_json::json!({"model": "gpt-4o", "choices": []}))
            .unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }
}
