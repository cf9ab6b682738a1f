//! Configuration types for agentlab

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AgentLabError, Result};

/// File read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "agentlab.toml";

/// Names an additional configuration file
pub const CONFIG_PATH_ENV: &str = "AGENTLAB_CONFIG_PATH";

/// Prefix of environment overrides; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "AGENTLAB_";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional, succinct AI assistant. \
Use tools whenever they are needed for accuracy. \
If asked about weather 'today', first call get_current_date, then call get_weather with the date formatted as YYYY-MM-DD.";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLabConfig {
    pub llm: LlmConfig,
    pub invocation: InvocationConfig,
    pub agent: AgentConfig,

    /// Queries run by `agentlab run` when none are given on the command line
    pub queries: Vec<String>,
}

impl Default for AgentLabConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            invocation: InvocationConfig::default(),
            agent: AgentConfig::default(),
            queries: default_queries(),
        }
    }
}

fn default_queries() -> Vec<String> {
    [
        "What time is it right now?",
        "What is 25 * 4 + 10?",
        "Reverse the string 'Hello World'",
        "What's the weather like today?",
        "What is the weather for 2023-04-05?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Chat-completions endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,

    pub model: String,

    /// Sampling temperature, clamped to 0.0-2.0 when sent
    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Environment variable holding the bearer token
    pub token_env: String,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://models.github.ai/inference".to_string(),
            model: "openai/gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: None,
            token_env: "GITHUB_TOKEN".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl LlmConfig {
    pub fn effective_temperature(&self) -> f32 {
        self.temperature.clamp(0.0, 2.0)
    }
}

/// Safe-invocation wrapper settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationConfig {
    /// Report queries as skipped instead of calling the model
    pub dry_run: bool,

    /// Ask the operator before each call
    pub confirm: bool,

    /// Pause after each successful call; 0 disables
    pub cooldown_ms: u64,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            confirm: true,
            cooldown_ms: 0,
        }
    }
}

impl InvocationConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Agent loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub system_prompt: String,

    /// Upper bound on model turns per query
    pub max_steps: usize,

    /// Offer the built-in tools to the model
    pub tools_enabled: bool,

    /// Per-call tool timeout
    #[serde(with = "humantime_serde")]
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_steps: 8,
            tools_enabled: true,
            tool_timeout: Duration::from_secs(5),
        }
    }
}

/// Load a `.env` file from the working directory or its parents into the
/// process environment. Variables already set are left alone.
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    dotenvy::dotenv().ok()
}

impl AgentLabConfig {
    /// Load configuration from files and environment variables.
    ///
    /// Loads in this order, later sources winning:
    /// 1. Built-in defaults
    /// 2. `agentlab.toml` in the working directory
    /// 3. The file named by `AGENTLAB_CONFIG_PATH`
    /// 4. `AGENTLAB_*` environment variables (`AGENTLAB_INVOCATION__DRY_RUN=false`)
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be parsed or the result is invalid.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`load`](Self::load), with an explicit file layered after
    /// `AGENTLAB_CONFIG_PATH`. The explicit file must exist.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(AgentLabConfig::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(env_path));
        }

        if let Some(path) = path {
            if !path.is_file() {
                return Err(AgentLabError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: AgentLabConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| {
                AgentLabError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Read the provider token from the environment variable named by
    /// `llm.token_env`.
    ///
    /// # Errors
    ///
    /// [`AgentLabError::MissingToken`] when the variable is unset or blank.
    pub fn resolve_token(&self) -> Result<String> {
        match std::env::var(&self.llm.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(AgentLabError::MissingToken {
                var: self.llm.token_env.clone(),
            }),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(AgentLabError::Configuration("llm.base_url is empty".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(AgentLabError::Configuration("llm.model is empty".into()));
        }
        if self.llm.token_env.trim().is_empty() {
            return Err(AgentLabError::Configuration("llm.token_env is empty".into()));
        }
        if !self.llm.temperature.is_finite() {
            return Err(AgentLabError::Configuration(
                "llm.temperature must be a finite number".into(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(AgentLabError::Configuration(
                "agent.max_steps must be at least 1".into(),
            ));
        }
        if let Some(index) = self.queries.iter().position(|q| q.trim().is_empty()) {
            return Err(AgentLabError::Configuration(format!(
                "queries[{}] is empty",
                index
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = AgentLabConfig::default();
        assert!(config.invocation.dry_run);
        assert!(config.invocation.confirm);
        assert_eq!(config.invocation.cooldown(), Duration::ZERO);
        assert_eq!(config.llm.model, "openai/gpt-4o");
        assert_eq!(config.llm.token_env, "GITHUB_TOKEN");
        assert_eq!(config.queries.len(), 5);
        assert_eq!(config.queries[1], "What is 25 * 4 + 10?");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_sources_gives_defaults() {
        Jail::expect_with(|_jail| {
            let config = AgentLabConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, AgentLabConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "agentlab.toml",
                r#"
                queries = ["What is 2 + 2?"]

                [invocation]
                dry_run = false
                cooldown_ms = 250

                [agent]
                tool_timeout = "2s"
                "#,
            )?;
            jail.set_env("AGENTLAB_INVOCATION__COOLDOWN_MS", "1000");
            jail.set_env("AGENTLAB_LLM__MODEL", "openai/gpt-4o-mini");

            let config = AgentLabConfig::load().map_err(|e| e.to_string())?;
            assert!(!config.invocation.dry_run);
            assert_eq!(config.invocation.cooldown_ms, 1000);
            assert_eq!(config.llm.model, "openai/gpt-4o-mini");
            assert_eq!(config.agent.tool_timeout, Duration::from_secs(2));
            assert_eq!(config.queries, vec!["What is 2 + 2?".to_string()]);
            // untouched sections keep their defaults
            assert!(config.invocation.confirm);
            assert_eq!(config.agent.max_steps, 8);
            Ok(())
        });
    }

    #[test]
    fn test_config_path_env() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[llm]\ntemperature = 0.5\n")?;
            jail.set_env(CONFIG_PATH_ENV, "custom.toml");

            let config = AgentLabConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.llm.temperature, 0.5);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path() {
        Jail::expect_with(|_jail| {
            let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
            let path = dir.path().join("lab.toml");
            std::fs::write(&path, "[invocation]\nconfirm = false\n").map_err(|e| e.to_string())?;

            let config = AgentLabConfig::load_with(Some(&path)).map_err(|e| e.to_string())?;
            assert!(!config.invocation.confirm);

            let missing = dir.path().join("missing.toml");
            let err = AgentLabConfig::load_with(Some(&missing)).unwrap_err();
            assert!(matches!(err, AgentLabError::Configuration(_)));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("agentlab.toml", "[agent]\nmax_steps = 0\n")?;
            let err = AgentLabConfig::load().unwrap_err();
            assert!(err.to_string().contains("max_steps"));
            Ok(())
        });

        let mut config = AgentLabConfig::default();
        config.queries.push("   ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_token() {
        Jail::expect_with(|jail| {
            let mut config = AgentLabConfig::default();
            config.llm.token_env = "LAB_TEST_TOKEN".to_string();

            let err = config.resolve_token().unwrap_err();
            assert!(matches!(err, AgentLabError::MissingToken { ref var } if var == "LAB_TEST_TOKEN"));
            assert!(err.is_fatal());

            jail.set_env("LAB_TEST_TOKEN", "   ");
            assert!(config.resolve_token().is_err());

            jail.set_env("LAB_TEST_TOKEN", "ghp_secret");
            assert_eq!(config.resolve_token().map_err(|e| e.to_string())?, "ghp_secret");
            Ok(())
        });
    }

    #[test]
    fn test_temperature_is_clamped() {
        let mut config = LlmConfig::default();
        config.temperature = 3.5;
        assert_eq!(config.effective_temperature(), 2.0);
    }
}
