//! Loop and budget settings shared by every agent the orchestrator builds.

use deputy_config::AppConfig;

use crate::budget::DEFAULT_CHARS_PER_TOKEN;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub temperature: f32,

    /// Max tokens per model response
    pub max_tokens: Option<u32>,

    pub chars_per_token: usize,

    /// Default budget for subagent results
    pub subagent_max_output_tokens: u32,

    /// Budget for oracle, search and librarian answers
    pub delegate_max_output_tokens: u32,

    /// Optional ceiling on Main's otherwise unbounded loop
    pub main_max_iterations: Option<u32>,

    /// Project framing for Main
    pub system_context: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: Some(8192),
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            subagent_max_output_tokens: 2000,
            delegate_max_output_tokens: 4000,
            main_max_iterations: None,
            system_context: None,
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            chars_per_token: config.budget.chars_per_token,
            subagent_max_output_tokens: config.budget.subagent_max_output_tokens,
            delegate_max_output_tokens: config.budget.delegate_max_output_tokens,
            main_max_iterations: config.limits.main_max_iterations,
            system_context: config.system_context.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_default_config() {
        let from_config = AgentSettings::from_config(&AppConfig::default());
        let defaults = AgentSettings::default();
        assert_eq!(from_config.chars_per_token, defaults.chars_per_token);
        assert_eq!(
            from_config.subagent_max_output_tokens,
            defaults.subagent_max_output_tokens
        );
        assert_eq!(from_config.max_tokens, defaults.max_tokens);
        assert_eq!(from_config.main_max_iterations, None);
    }

    #[test]
    fn config_overrides_flow_through() {
        let mut config = AppConfig::default();
        config.budget.chars_per_token = 3;
        config.limits.main_max_iterations = Some(40);
        config.system_context = Some("monorepo".into());
        let settings = AgentSettings::from_config(&config);
        assert_eq!(settings.chars_per_token, 3);
        assert_eq!(settings.main_max_iterations, Some(40));
        assert_eq!(settings.system_context.as_deref(), Some("monorepo"));
    }
}
