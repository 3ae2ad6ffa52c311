//! Shared test helpers: scripted providers and stub tools.

use async_trait::async_trait;
use deputy_core::error::{ProviderError, ToolError};
use deputy_core::message::{Part, Role, ToolCall, Turn};
use deputy_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use deputy_core::role::{CORE_TOOLS, META_TOOLS};
use deputy_core::tool::{Tool, ToolRegistry};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses
/// provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        if index >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                responses.len()
            );
        }
        requests.push(request);
        Ok(responses[index].clone())
    }
}

/// Always asks for one more tool call; never converges.
pub struct AlwaysToolProvider {
    tool: String,
    calls: Mutex<u32>,
}

impl AlwaysToolProvider {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.into(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(make_tool_call_response(
            vec![make_tool_call(
                &format!("call_{calls}"),
                &self.tool,
                serde_json::json!({}),
            )],
            "",
        ))
    }
}

/// Answers based on the task text of the first turn:
/// "fail" -> provider error, "panic" -> panic, "slow" -> 50ms delay,
/// otherwise `done: <task>`.
pub struct TaskKeyedProvider;

#[async_trait]
impl Provider for TaskKeyedProvider {
    fn name(&self) -> &str {
        "task_keyed"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let task = request
            .turns
            .first()
            .map(|t| t.text())
            .unwrap_or_default();
        if task.contains("slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if task.contains("panic") {
            panic!("provider blew up on '{task}'");
        }
        if task.contains("fail") {
            return Err(ProviderError::Network("connection reset".into()));
        }
        let first_line = task.lines().next().unwrap_or_default();
        Ok(make_text_response(&format!("done: {first_line}")))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        turn: Turn::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        stop_reason: Some("end_turn".into()),
    }
}

/// Create a response carrying tool calls, with optional leading text.
pub fn make_tool_call_response(calls: Vec<ToolCall>, thought: &str) -> ProviderResponse {
    let mut parts = Vec::new();
    if !thought.is_empty() {
        parts.push(Part::Text {
            text: thought.into(),
        });
    }
    parts.extend(calls.into_iter().map(Part::ToolCall));
    ProviderResponse {
        turn: Turn::new(Role::Assistant, parts),
        usage: Some(Usage {
            prompt_tokens: 20,
            completion_tokens: 10,
            total_tokens: 30,
        }),
        model: "mock-model".into(),
        stop_reason: Some("tool_use".into()),
    }
}

pub fn make_tool_call(id: &str, name: &str, input: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, input)
}

/// A tool that waits, then returns fixed output (or fails).
pub struct StubTool {
    name: String,
    output: String,
    delay: Duration,
    fail: bool,
}

impl StubTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "stub"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: self.output.clone(),
            });
        }
        Ok(self.output.clone())
    }
}

/// A registry with a stub for every core and meta tool name.
pub fn full_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for name in CORE_TOOLS.iter().chain(META_TOOLS) {
        registry.register(Arc::new(StubTool::new(name, name)));
    }
    registry
}
