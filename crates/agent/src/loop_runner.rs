//! The tool-call loop.
//!
//! One loop drives one [`AgentContext`] to termination:
//!
//! 1. **Check** for a requested stop, then for an exhausted iteration cap
//! 2. **Send** the full conversation plus the role's tool schemas
//! 3. **If tool calls**: execute them in turn order, append the results as
//!    one follow-up turn, loop back to step 1
//! 4. **If text only**: return it
//!
//! Tool failures never end the loop; they come back as result text the
//! model can read and correct.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use deputy_core::event::{AgentEvent, EventBus, Termination};
use deputy_core::message::ToolResult;
use deputy_core::provider::{Provider, ProviderRequest};
use deputy_core::role::IterationCap;
use tracing::{debug, info, warn};

use crate::context::AgentContext;

/// Returned in place of model text when a loop runs out of iterations.
pub const MAX_ITERATIONS_REACHED: &str = "Maximum iterations reached";

/// Returned in place of model text when a stop was requested.
pub const INTERRUPTED: &str = "Interrupted before completion";

/// A shared stop request, checked between iterations.
///
/// Requesting a stop never cancels an in-flight model or tool call; the
/// loop halts at the next iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Final model text, or one of the sentinels above
    pub text: String,

    /// Model round trips taken
    pub iterations: u32,

    pub termination: Termination,
}

impl LoopOutcome {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Drives a context through model turns and tool executions.
pub struct ToolCallLoop {
    /// The provider to call
    provider: Arc<dyn Provider>,

    /// The model to request
    model: String,

    /// Role framing sent with every request
    system_prompt: Option<String>,

    temperature: f32,

    /// Max tokens per model response
    max_tokens: Option<u32>,

    /// Event bus for progress events
    events: Arc<EventBus>,

    stop: StopSignal,
}

impl ToolCallLoop {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, events: Arc<EventBus>) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: None,
            temperature: 0.2,
            max_tokens: None,
            events,
            stop: StopSignal::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Share a stop signal with the caller (and with sibling loops).
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run the context until the model converges, the cap is hit, or a stop
    /// is requested.
    ///
    /// Only a provider failure is returned as an error.
    pub async fn run(&self, ctx: &mut AgentContext) -> deputy_core::Result<LoopOutcome> {
        info!(
            agent = %ctx.id(),
            role = %ctx.role(),
            cap = %ctx.iteration_cap(),
            tools = ctx.tools().len(),
            "Starting tool-call loop"
        );

        loop {
            if self.stop.is_requested() {
                info!(agent = %ctx.id(), iterations = ctx.iteration_count(), "Stop requested");
                return Ok(self.finish(ctx, INTERRUPTED.into(), Termination::Interrupted));
            }

            if ctx.cap_reached() {
                warn!(
                    agent = %ctx.id(),
                    role = %ctx.role(),
                    iterations = ctx.iteration_count(),
                    "Iteration cap reached without convergence"
                );
                return Ok(self.finish(
                    ctx,
                    MAX_ITERATIONS_REACHED.into(),
                    Termination::Exhausted,
                ));
            }

            let iteration = ctx.begin_iteration();
            self.events.publish(AgentEvent::IterationStarted {
                agent: ctx.id().to_string(),
                role: ctx.role(),
                iteration,
                timestamp: Utc::now(),
            });

            let request = ProviderRequest {
                model: self.model.clone(),
                system: self.system_prompt.clone(),
                turns: ctx.conversation().turns().to_vec(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: ctx.tool_definitions(),
            };

            debug!(
                agent = %ctx.id(),
                iteration,
                turns = request.turns.len(),
                "Sending request to provider"
            );

            let response = self.provider.complete(request).await?;

            self.events.publish(AgentEvent::ModelResponded {
                agent: ctx.id().to_string(),
                model: response.model.clone(),
                tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
                timestamp: Utc::now(),
            });

            let turn = response.turn;
            if !turn.has_tool_calls() {
                let text = turn.text();
                ctx.push(turn);
                return Ok(self.finish(ctx, text, Termination::Converged));
            }

            let calls: Vec<_> = turn.tool_calls().into_iter().cloned().collect();
            ctx.push(turn);

            let mut results: Vec<ToolResult> = Vec::with_capacity(calls.len());
            for call in &calls {
                debug!(agent = %ctx.id(), tool = %call.name, call_id = %call.id, "Executing tool");
                self.events.publish(AgentEvent::ToolCallStarted {
                    agent: ctx.id().to_string(),
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    timestamp: Utc::now(),
                });

                let started = Instant::now();
                let result = ctx.tools().execute(call).await;

                if result.is_error {
                    debug!(agent = %ctx.id(), tool = %call.name, "Tool returned an error result");
                }
                self.events.publish(AgentEvent::ToolCallFinished {
                    agent: ctx.id().to_string(),
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    is_error: result.is_error,
                    duration_ms: started.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                });
                results.push(result);
            }

            ctx.push(deputy_core::Turn::tool_results(results));
        }
    }

    fn finish(&self, ctx: &AgentContext, text: String, reason: Termination) -> LoopOutcome {
        self.events.publish(AgentEvent::LoopTerminated {
            agent: ctx.id().to_string(),
            role: ctx.role(),
            iterations: ctx.iteration_count(),
            reason,
            timestamp: Utc::now(),
        });
        if reason == Termination::Converged {
            info!(agent = %ctx.id(), iterations = ctx.iteration_count(), "Loop converged");
        }
        LoopOutcome {
            text,
            iterations: ctx.iteration_count(),
            termination: reason,
        }
    }
}

/// Whether a returned string is one of the loop's non-answer sentinels.
pub fn is_sentinel(text: &str) -> bool {
    text == MAX_ITERATIONS_REACHED || text == INTERRUPTED
}

/// The cap a loop would enforce for `cap`, for display.
pub fn describe_cap(cap: IterationCap) -> String {
    match cap.limit() {
        Some(max) => format!("{max} iterations"),
        None => "until convergence".into(),
    }
}
