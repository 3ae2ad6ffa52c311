//! Configuration loading, validation, and management for deputy.
//!
//! Loads configuration from `~/.deputy/config.toml`, overlays a
//! project-local `./.deputy/config.toml`, then applies environment variable
//! overrides. Validates all settings at startup.

use deputy_core::provider::Protocol;
use deputy_core::role::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deputy/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key used when a provider entry has none of its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default completion provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature for every role
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Free-text framing injected into the Main prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_context: Option<String>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Per-role provider/model overrides, keyed by role name
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_context", &self.system_context.as_ref().map(|s| s.len()))
            .field("providers", &self.providers)
            .field("roles", &self.roles)
            .field("feedback", &self.feedback)
            .field("budget", &self.budget)
            .field("retry", &self.retry)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Connection settings for one named provider.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Wire protocol; inferred from the provider name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
}

impl ProviderConfig {
    pub fn protocol_for(&self, name: &str) -> Protocol {
        self.protocol.unwrap_or_else(|| Protocol::infer(name))
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// Provider/model override for one role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The provider and model a role resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBinding {
    pub provider: String,
    pub model: String,
}

/// External validation checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_true")]
    pub type_check: bool,

    #[serde(default = "default_true")]
    pub tests: bool,

    #[serde(default = "default_true")]
    pub lint: bool,

    /// Override for the type-check command (default: `npx tsc --noEmit`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_check_command: Option<String>,

    /// Override for the test command (skips runner probing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,

    /// Override for the lint command (default: `npx eslint .`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint_command: Option<String>,

    /// Test runners probed in priority order
    #[serde(default = "default_test_runners")]
    pub test_runners: Vec<String>,

    #[serde(default = "default_feedback_timeout")]
    pub timeout_secs: u64,

    /// Characters of failure output kept per check
    #[serde(default = "default_output_limit")]
    pub output_limit: usize,
}

fn default_test_runners() -> Vec<String> {
    vec!["bun".into(), "vitest".into(), "jest".into()]
}
fn default_feedback_timeout() -> u64 {
    300
}
fn default_output_limit() -> usize {
    2000
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            type_check: true,
            tests: true,
            lint: true,
            type_check_command: None,
            test_command: None,
            lint_command: None,
            test_runners: default_test_runners(),
            timeout_secs: default_feedback_timeout(),
            output_limit: default_output_limit(),
        }
    }
}

/// Output budgeting for text crossing an isolation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Characters assumed per token by the truncation heuristic
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    /// Default budget for `spawn_subagent` / `parallel_subagents` results
    #[serde(default = "default_subagent_budget")]
    pub subagent_max_output_tokens: u32,

    /// Budget for oracle, search and librarian answers
    #[serde(default = "default_delegate_budget")]
    pub delegate_max_output_tokens: u32,
}

fn default_chars_per_token() -> usize {
    4
}
fn default_subagent_budget() -> u32 {
    2000
}
fn default_delegate_budget() -> u32 {
    4000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            subagent_max_output_tokens: default_subagent_budget(),
            delegate_max_output_tokens: default_delegate_budget(),
        }
    }
}

/// Backoff policy for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry attempts after the first call (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay, doubled on each retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Optional ceiling on Main's iterations; absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_max_iterations: Option<u32>,
}

impl AppConfig {
    /// Load configuration from the default locations.
    ///
    /// Order: `~/.deputy/config.toml`, then `./.deputy/config.toml` merged
    /// over it, then environment variables:
    /// - `DEPUTY_PROVIDER`, `DEPUTY_MODEL`
    /// - `DEPUTY_API_KEY` (highest priority), then the vendor key matching
    ///   the default provider (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`,
    ///   `GEMINI_API_KEY`)
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::config_dir().join("config.toml");
        let local = Self::project_dir().join("config.toml");
        let mut config = Self::load_layered(&[global.as_path(), local.as_path()])?;

        if let Ok(provider) = std::env::var("DEPUTY_PROVIDER") {
            config.default_provider = provider;
        }
        if let Ok(model) = std::env::var("DEPUTY_MODEL") {
            config.default_model = model;
        }

        if let Ok(key) = std::env::var("DEPUTY_API_KEY") {
            config.api_key = Some(key);
        }
        for (name, provider) in config.providers.iter_mut() {
            if provider.api_key.is_none() {
                provider.api_key = vendor_key_env(provider.protocol_for(name))
                    .and_then(|var| std::env::var(var).ok());
            }
        }
        if config.api_key.is_none() {
            let protocol = config
                .providers
                .get(&config.default_provider)
                .map(|p| p.protocol_for(&config.default_provider))
                .unwrap_or_else(|| Protocol::infer(&config.default_provider));
            config.api_key = vendor_key_env(protocol).and_then(|var| std::env::var(var).ok());
        }

        if config.system_context.is_none() {
            let context_path = Self::project_dir().join("CONTEXT.md");
            if let Ok(text) = std::fs::read_to_string(&context_path) {
                tracing::debug!("Loaded system context from {}", context_path.display());
                config.system_context = Some(text);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layered(&[path])
    }

    /// Merge each existing file over the previous ones, table by table.
    pub fn load_layered(paths: &[&Path]) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut found = false;

        for path in paths {
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let layer: toml::Value =
                toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            merge_toml(&mut merged, layer);
            found = true;
        }

        if !found {
            tracing::info!("No config file found, using defaults");
            return Ok(Self::default());
        }

        let config = merged
            .try_into::<Self>()
            .map_err(|e| ConfigError::ParseError {
                path: paths.last().map(|p| p.to_path_buf()).unwrap_or_default(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the user-level configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deputy")
    }

    /// Get the project-local configuration directory path.
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".deputy")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.budget.chars_per_token == 0 {
            return Err(ConfigError::ValidationError(
                "budget.chars_per_token must be > 0".into(),
            ));
        }

        for name in self.roles.keys() {
            if name.parse::<AgentRole>().is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "unknown role '{name}' in [roles]"
                )));
            }
        }

        if self.limits.main_max_iterations == Some(0) {
            return Err(ConfigError::ValidationError(
                "limits.main_max_iterations must be > 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the provider and model a role runs on.
    pub fn role_binding(&self, role: AgentRole) -> RoleBinding {
        let entry = self.roles.get(&role.to_string());
        RoleBinding {
            provider: entry
                .and_then(|r| r.provider.clone())
                .unwrap_or_else(|| self.default_provider.clone()),
            model: entry
                .and_then(|r| r.model.clone())
                .unwrap_or_else(|| self.default_model.clone()),
        }
    }

    /// API key for a provider: its own entry first, then the global key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_context: None,
            providers: HashMap::new(),
            roles: HashMap::new(),
            feedback: FeedbackConfig::default(),
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

fn vendor_key_env(protocol: Protocol) -> Option<&'static str> {
    match protocol {
        Protocol::Anthropic => Some("ANTHROPIC_API_KEY"),
        Protocol::OpenAi => Some("OPENAI_API_KEY"),
        Protocol::Gemini => Some("GEMINI_API_KEY"),
    }
}

/// Recursive table merge; scalars and arrays in `overlay` win.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
