//! Role router: resolves each agent role to a provider and model.
//!
//! Providers are created once per configured name and shared between every
//! role bound to them.

use std::collections::HashMap;
use std::sync::Arc;

use deputy_config::AppConfig;
use deputy_core::error::ProviderError;
use deputy_core::provider::{Protocol, Provider};
use deputy_core::role::AgentRole;
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryingProvider;

/// A provider paired with the model a role should request from it.
#[derive(Clone)]
pub struct RoleRoute {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

/// Routes each [`AgentRole`] to its provider and model.
#[derive(Clone, Default)]
pub struct RoleRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    routes: HashMap<AgentRole, (String, String)>,
}

impl RoleRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under a name.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Bind a role to a registered provider name and a model.
    pub fn bind(&mut self, role: AgentRole, provider: impl Into<String>, model: impl Into<String>) {
        self.routes.insert(role, (provider.into(), model.into()));
    }

    /// A router that sends every role to the same provider and model.
    pub fn uniform(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let model = model.into();
        let name = provider.name().to_string();
        let mut router = Self::new();
        router.register(name.clone(), provider);
        for role in AgentRole::ALL {
            router.bind(role, name.clone(), model.clone());
        }
        router
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Resolve the provider and model for a role.
    pub fn route(&self, role: AgentRole) -> Result<RoleRoute, ProviderError> {
        let (name, model) = self
            .routes
            .get(&role)
            .ok_or_else(|| ProviderError::NotConfigured(format!("no route for role '{role}'")))?;
        let provider = self
            .get(name)
            .ok_or_else(|| ProviderError::NotConfigured(format!("provider '{name}'")))?;
        Ok(RoleRoute {
            provider,
            model: model.clone(),
        })
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build the router from configuration.
///
/// Every provider named by a role binding is constructed with the protocol
/// its config entry declares (or infers) and wrapped in a
/// [`RetryingProvider`] unless `retry.max_retries` is zero.
pub fn build_from_config(config: &AppConfig) -> RoleRouter {
    let mut router = RoleRouter::new();

    for role in AgentRole::ALL {
        let binding = config.role_binding(role);
        if router.get(&binding.provider).is_none() {
            let provider = build_provider(config, &binding.provider);
            router.register(binding.provider.clone(), provider);
        }
        debug!(role = %role, provider = %binding.provider, model = %binding.model, "Role bound");
        router.bind(role, binding.provider, binding.model);
    }

    router
}

fn build_provider(config: &AppConfig, name: &str) -> Arc<dyn Provider> {
    let entry = config.providers.get(name);
    let protocol = entry
        .map(|p| p.protocol_for(name))
        .unwrap_or_else(|| Protocol::infer(name));
    let api_key = config.api_key_for(name).unwrap_or_default();
    let api_url = entry.and_then(|p| p.api_url.clone());

    let provider: Arc<dyn Provider> = match protocol {
        Protocol::Anthropic => {
            let mut p = AnthropicProvider::new(&api_key);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        Protocol::Gemini => {
            let mut p = GeminiProvider::new(&api_key);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        Protocol::OpenAi => {
            let base_url = api_url.unwrap_or_else(|| default_base_url(name));
            Arc::new(OpenAiCompatProvider::new(name, base_url, &api_key))
        }
    };

    if config.retry.max_retries == 0 {
        provider
    } else {
        Arc::new(RetryingProvider::new(provider, config.retry.clone()))
    }
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
