//! Main-role assembly.
//!
//! The orchestrator wires the role router, the core tools and the
//! meta-tools into a Main context and drives it to termination.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use deputy_config::AppConfig;
use deputy_core::event::EventBus;
use deputy_core::role::AgentRole;
use deputy_providers::RoleRouter;
use tracing::info;

use crate::context::AgentContext;
use crate::loop_runner::{LoopOutcome, StopSignal, ToolCallLoop};
use crate::meta_tools::register_meta_tools;
use crate::prompts;
use crate::settings::AgentSettings;
use crate::subagent::{RegistryFactory, SubagentScheduler};

pub struct Orchestrator {
    router: RoleRouter,
    settings: AgentSettings,
    working_dir: PathBuf,
    registry_factory: Option<RegistryFactory>,
    events: Arc<EventBus>,
    stop: StopSignal,
}

impl Orchestrator {
    pub fn new(router: RoleRouter, settings: AgentSettings, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            router,
            settings,
            working_dir: working_dir.into(),
            registry_factory: None,
            events: Arc::new(EventBus::default()),
            stop: StopSignal::default(),
        }
    }

    /// Build providers and settings from configuration.
    pub fn from_config(config: &AppConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            deputy_providers::build_from_config(config),
            AgentSettings::from_config(config),
            working_dir,
        )
    }

    /// Replace the core tool set given to Main and every delegate.
    pub fn with_registry_factory(mut self, factory: RegistryFactory) -> Self {
        self.registry_factory = Some(factory);
        self
    }

    /// Subscribe here to observe every loop the orchestrator runs.
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Request this to stop Main and all running delegates at their next
    /// iteration boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn scheduler(&self) -> SubagentScheduler {
        let scheduler = SubagentScheduler::new(
            self.router.clone(),
            self.settings.clone(),
            self.working_dir.clone(),
        )
        .with_events(self.events.clone())
        .with_stop_signal(self.stop.clone());
        match &self.registry_factory {
            Some(factory) => scheduler.with_registry_factory(factory.clone()),
            None => scheduler,
        }
    }

    /// Run `task` as Main.
    ///
    /// Delegate failures reach Main as tool-result text; only a failure of
    /// Main's own provider is returned as an error.
    pub async fn run(&self, task: &str) -> deputy_core::Result<LoopOutcome> {
        let route = self.router.route(AgentRole::Main)?;
        let scheduler = Arc::new(self.scheduler());

        let mut registry = match &self.registry_factory {
            Some(factory) => factory(self.working_dir.as_path()),
            None => deputy_tools::core_registry(&self.working_dir),
        };
        register_meta_tools(&mut registry, scheduler);

        let mut ctx = AgentContext::new(AgentRole::Main, task, &registry);
        if let Some(ceiling) = self.settings.main_max_iterations {
            ctx = ctx.with_iteration_ceiling(ceiling);
        }

        let system_prompt = prompts::system_prompt(
            AgentRole::Main,
            &self.working_dir,
            self.settings.system_context.as_deref(),
        );

        let mut runner = ToolCallLoop::new(route.provider, route.model, self.events.clone())
            .with_system_prompt(system_prompt)
            .with_temperature(self.settings.temperature)
            .with_stop_signal(self.stop.clone());
        if let Some(max) = self.settings.max_tokens {
            runner = runner.with_max_tokens(max);
        }

        info!(agent = %ctx.id(), model = %runner.model(), "Running main agent");
        runner.run(&mut ctx).await
    }
}
