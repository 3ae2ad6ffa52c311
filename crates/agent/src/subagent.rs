//! Sub-agent scheduling: isolated delegate runs for Main.
//!
//! Every delegate gets a fresh [`AgentContext`] seeded with nothing but its
//! task. When the loop ends the context is dropped, and only the final text,
//! cut to the output budget, goes back to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use deputy_core::event::{AgentEvent, EventBus};
use deputy_core::role::AgentRole;
use deputy_core::tool::ToolRegistry;
use deputy_providers::RoleRouter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::budget::OutputBudgeter;
use crate::context::AgentContext;
use crate::loop_runner::{StopSignal, ToolCallLoop};
use crate::prompts::{self, RequestKind};
use crate::settings::AgentSettings;

/// Builds the core tool set for a working directory.
pub type RegistryFactory = Arc<dyn Fn(&Path) -> ToolRegistry + Send + Sync>;

/// How a subagent should shape its final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl OutputFormat {
    /// Appended to the task; empty for plain text.
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Text => "",
            Self::Markdown => "Format your final report as Markdown.",
            Self::Json => {
                "Format your final report as a single JSON object and nothing else."
            }
        }
    }
}

/// One unit of delegated work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentTask {
    /// Label used in fan-out reports
    pub name: String,

    /// Self-contained task text
    pub task: String,

    /// Working directory, relative to the orchestrator's root when relative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(default)]
    pub output_format: OutputFormat,
}

impl SubagentTask {
    pub fn new(name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task: task.into(),
            working_directory: None,
            max_output_tokens: None,
            output_format: OutputFormat::Text,
        }
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// The text the subagent's conversation is seeded with.
    pub fn prompt_text(&self) -> String {
        match self.output_format.instruction() {
            "" => self.task.clone(),
            instruction => format!("{}\n\n{instruction}", self.task),
        }
    }
}

/// Runs delegate agents on behalf of Main.
pub struct SubagentScheduler {
    router: RoleRouter,
    registry_factory: RegistryFactory,
    events: Arc<EventBus>,
    budgeter: OutputBudgeter,
    settings: AgentSettings,
    working_dir: PathBuf,
    stop: StopSignal,
}

impl SubagentScheduler {
    pub fn new(router: RoleRouter, settings: AgentSettings, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            router,
            registry_factory: Arc::new(|dir: &Path| deputy_tools::core_registry(dir)),
            events: Arc::new(EventBus::default()),
            budgeter: OutputBudgeter::new(settings.chars_per_token),
            settings,
            working_dir: working_dir.into(),
            stop: StopSignal::default(),
        }
    }

    /// Replace the core tool set delegates are given.
    pub fn with_registry_factory(mut self, factory: RegistryFactory) -> Self {
        self.registry_factory = factory;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn router(&self) -> &RoleRouter {
        &self.router
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn budgeter(&self) -> OutputBudgeter {
        self.budgeter
    }

    /// Run a Subagent on `task` and return its budgeted final text.
    pub async fn spawn(&self, task: &SubagentTask) -> deputy_core::Result<String> {
        let dir = match &task.working_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.working_dir.join(dir),
            None => self.working_dir.clone(),
        };
        let max_tokens = task
            .max_output_tokens
            .unwrap_or(self.settings.subagent_max_output_tokens);
        let prompt = prompts::system_prompt(AgentRole::Subagent, &dir, None);

        self.delegate(
            AgentRole::Subagent,
            &task.name,
            task.prompt_text(),
            &dir,
            prompt,
            max_tokens,
        )
        .await
    }

    /// Like [`Self::spawn`], with failures rendered as text.
    pub async fn spawn_text(&self, task: &SubagentTask) -> String {
        self.spawn(task)
            .await
            .unwrap_or_else(|e| render_error(AgentRole::Subagent, &e))
    }

    /// Ask the Oracle. Failures come back as `"Oracle error: ..."`.
    pub async fn consult_oracle(&self, question: &str, context: Option<&str>) -> String {
        let task = match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(context) => format!("{question}\n\n## Context\n{context}"),
            None => question.to_string(),
        };
        let prompt = prompts::system_prompt(AgentRole::Oracle, &self.working_dir, None);
        self.delegate_text(AgentRole::Oracle, "oracle", task, prompt)
            .await
    }

    /// Run a Search agent over the codebase.
    pub async fn search(&self, query: &str) -> String {
        let prompt = prompts::system_prompt(AgentRole::Search, &self.working_dir, None);
        self.delegate_text(AgentRole::Search, "search", query.to_string(), prompt)
            .await
    }

    /// Ask the Librarian. The request type is classified when not given.
    pub async fn consult_librarian(&self, question: &str, kind: Option<RequestKind>) -> String {
        let kind = kind.unwrap_or_else(|| RequestKind::classify(question));
        let prompt = prompts::librarian_prompt(kind, &self.working_dir);
        self.delegate_text(AgentRole::Librarian, "librarian", question.to_string(), prompt)
            .await
    }

    async fn delegate_text(&self, role: AgentRole, label: &str, task: String, prompt: String) -> String {
        let result = self
            .delegate(
                role,
                label,
                task,
                &self.working_dir,
                prompt,
                self.settings.delegate_max_output_tokens,
            )
            .await;
        result.unwrap_or_else(|e| render_error(role, &e))
    }

    async fn delegate(
        &self,
        role: AgentRole,
        label: &str,
        task: String,
        dir: &Path,
        system_prompt: String,
        max_output_tokens: u32,
    ) -> deputy_core::Result<String> {
        let route = self.router.route(role)?;
        let available = (self.registry_factory)(dir);
        let mut ctx = AgentContext::new(role, task, &available);

        info!(agent = %ctx.id(), role = %role, label, model = %route.model, "Delegating");
        self.events.publish(AgentEvent::DelegateStarted {
            agent: ctx.id().to_string(),
            role,
            label: label.to_string(),
            timestamp: Utc::now(),
        });

        let mut runner = ToolCallLoop::new(route.provider, route.model, self.events.clone())
            .with_system_prompt(system_prompt)
            .with_temperature(self.settings.temperature)
            .with_stop_signal(self.stop.clone());
        if let Some(max) = self.settings.max_tokens {
            runner = runner.with_max_tokens(max);
        }

        let started = Instant::now();
        let result = runner.run(&mut ctx).await;

        self.events.publish(AgentEvent::DelegateFinished {
            agent: ctx.id().to_string(),
            role,
            label: label.to_string(),
            success: result.is_ok(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });

        match result {
            Ok(outcome) => Ok(self.budgeter.truncate(&outcome.text, max_output_tokens)),
            Err(e) => {
                warn!(agent = %ctx.id(), role = %role, error = %e, "Delegate failed");
                Err(e)
            }
        }
    }
}

fn render_error(role: AgentRole, error: &deputy_core::Error) -> String {
    format!("{} error: {error}", role.label())
}
