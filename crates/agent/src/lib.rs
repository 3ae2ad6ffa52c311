//! Agent orchestration for deputy.
//!
//! A [`ToolCallLoop`] drives one [`AgentContext`] to termination:
//!
//! 1. **Send** the conversation and the role's tool schemas to the model
//! 2. **If tool calls**: execute them in order, append the results, repeat
//! 3. **If text only**: return it
//!
//! The loop stops on convergence, at the role's iteration cap, or when a
//! stop is requested. Main reaches the other roles through meta-tools that
//! hand work to the [`SubagentScheduler`]; delegates never see meta-tools,
//! so delegation is one level deep.

pub mod budget;
pub mod context;
pub mod fanout;
pub mod loop_runner;
pub mod meta_tools;
pub mod orchestrator;
pub mod prompts;
pub mod settings;
pub mod subagent;

#[cfg(test)]
mod test_helpers;

pub use budget::{DEFAULT_CHARS_PER_TOKEN, OutputBudgeter};
pub use context::AgentContext;
pub use fanout::{FanoutReport, ParallelFanout, TaskOutcome, fan_out};
pub use loop_runner::{
    INTERRUPTED, LoopOutcome, MAX_ITERATIONS_REACHED, StopSignal, ToolCallLoop, is_sentinel,
};
pub use meta_tools::register_meta_tools;
pub use orchestrator::Orchestrator;
pub use prompts::RequestKind;
pub use settings::AgentSettings;
pub use subagent::{OutputFormat, RegistryFactory, SubagentScheduler, SubagentTask};
