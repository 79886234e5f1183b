//! Configuration system for Delve.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/delve/config.toml` and/or `.delve/config.toml`
//! in the workspace directory.

use crate::error::ConfigError;
use crate::types::{ModelProfile, ToolVariant};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for Delve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelveConfig {
    pub llm: LlmConfig,
    pub research: ResearchConfig,
    pub server: ServerConfig,
}

/// Text-generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name. Only "gemini" ships with Delve.
    pub provider: String,
    /// Model used for brainstorming and sub-topic research.
    pub fast_model: String,
    /// Model used for the final synthesis.
    pub synthesis_model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key (never serialized; set programmatically).
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Ask the backend which models are available and pick one at startup.
    pub auto_detect_model: bool,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Optional cap on generated tokens.
    pub max_tokens: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            fast_model: "gemini-2.5-flash".to_string(),
            synthesis_model: "gemini-2.5-pro".to_string(),
            api_key_env: "API_KEY".to_string(),
            api_key: None,
            base_url: None,
            auto_detect_model: false,
            timeout_secs: 120,
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    /// Model identifier for a profile.
    pub fn model_for(&self, profile: ModelProfile) -> &str {
        match profile {
            ModelProfile::Fast => &self.fast_model,
            ModelProfile::Synthesis => &self.synthesis_model,
        }
    }
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Fewest sub-topics accepted from brainstorming.
    pub min_sub_topics: usize,
    /// Most sub-topics kept from brainstorming; extra entries are dropped.
    pub max_sub_topics: usize,
    /// Pause between consecutive sub-topics.
    pub cooldown_secs: u64,
    /// Full generation attempts per sub-topic.
    pub max_attempts: u32,
    /// First exponential backoff step when the backend gives no wait hint.
    pub initial_backoff_secs: u64,
    /// Upper bound for any single backoff.
    pub max_backoff_secs: u64,
    /// Added to a server-suggested wait to absorb clock skew.
    pub rate_limit_margin_secs: u64,
    /// Longest server-suggested wait honoured before the margin is added.
    pub max_server_wait_secs: u64,
    /// Fixed delay after a transient backend error.
    pub transient_delay_secs: u64,
    /// Search tool variants probed in order.
    pub tool_variants: Vec<String>,
    /// Variant to try first on the first sub-topic, if already known to work.
    pub preferred_tool: Option<String>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            min_sub_topics: 3,
            max_sub_topics: 3,
            cooldown_secs: 10,
            max_attempts: 3,
            initial_backoff_secs: 5,
            max_backoff_secs: 60,
            rate_limit_margin_secs: 5,
            max_server_wait_secs: 600,
            transient_delay_secs: 5,
            tool_variants: vec![
                "google_search".to_string(),
                "google_search_retrieval".to_string(),
                "google_search_tool".to_string(),
            ],
            preferred_tool: None,
        }
    }
}

impl ResearchConfig {
    /// Deeper profile: 5 to 7 sub-topics per report.
    pub fn deep() -> Self {
        Self {
            min_sub_topics: 5,
            max_sub_topics: 7,
            ..Self::default()
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn tool_variants(&self) -> Vec<ToolVariant> {
        self.tool_variants
            .iter()
            .map(|name| ToolVariant::new(name.as_str()))
            .collect()
    }

    pub fn preferred_tool(&self) -> Option<ToolVariant> {
        self.preferred_tool.as_deref().map(ToolVariant::new)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "research.max_attempts must be at least 1".to_string(),
            });
        }
        if self.min_sub_topics == 0 {
            return Err(ConfigError::Invalid {
                message: "research.min_sub_topics must be at least 1".to_string(),
            });
        }
        if self.min_sub_topics > self.max_sub_topics {
            return Err(ConfigError::Invalid {
                message: format!(
                    "research.min_sub_topics ({}) exceeds research.max_sub_topics ({})",
                    self.min_sub_topics, self.max_sub_topics
                ),
            });
        }
        Ok(())
    }

    /// Return human-readable warnings for settings that work but look wrong.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.initial_backoff_secs > self.max_backoff_secs {
            warnings.push(format!(
                "initial_backoff_secs ({}) > max_backoff_secs ({}); every backoff will be capped",
                self.initial_backoff_secs, self.max_backoff_secs
            ));
        }
        if self.max_server_wait_secs < self.max_backoff_secs {
            warnings.push(format!(
                "max_server_wait_secs ({}) < max_backoff_secs ({}); server retry hints will be cut short",
                self.max_server_wait_secs, self.max_backoff_secs
            ));
        }
        if self.cooldown_secs == 0 {
            warnings.push(
                "cooldown_secs is 0; consecutive sub-topics will hit the backend back to back"
                    .to_string(),
            );
        }
        if self.tool_variants.is_empty() {
            warnings.push("no tool_variants configured; research runs without grounding".into());
        }
        if let Some(preferred) = &self.preferred_tool {
            if !self.tool_variants.contains(preferred) {
                warnings.push(format!(
                    "preferred_tool '{}' is not listed in tool_variants",
                    preferred
                ));
            }
        }
        warnings
    }
}

/// Websocket trigger server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. `RESEARCH_MODEL` (mapped onto `llm.fast_model`)
/// 3. Environment variables (prefixed with `DELVE_`)
/// 4. Workspace-local config (`.delve/config.toml`)
/// 5. User config (`~/.config/delve/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&DelveConfig>,
) -> Result<DelveConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DelveConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "delve", "delve") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".delve").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // DELVE_LLM__FAST_MODEL, DELVE_RESEARCH__COOLDOWN_SECS, ...
    figment = figment.merge(Env::prefixed("DELVE_").split("__"));
    figment = figment.merge(
        Env::raw()
            .only(&["RESEARCH_MODEL"])
            .map(|_| "llm.fast_model".into()),
    );

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DelveConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.api_key_env, "API_KEY");
        assert_eq!(config.research.min_sub_topics, 3);
        assert_eq!(config.research.max_sub_topics, 3);
        assert_eq!(config.research.cooldown_secs, 10);
        assert_eq!(config.research.max_attempts, 3);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_deep_profile() {
        let config = ResearchConfig::deep();
        assert_eq!(config.min_sub_topics, 5);
        assert_eq!(config.max_sub_topics, 7);
        assert_eq!(config.max_attempts, 3);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_model_for_profile() {
        let llm = LlmConfig::default();
        assert_eq!(llm.model_for(ModelProfile::Fast), "gemini-2.5-flash");
        assert_eq!(llm.model_for(ModelProfile::Synthesis), "gemini-2.5-pro");
    }

    #[test]
    fn test_check_rejects_inverted_counts() {
        let config = ResearchConfig {
            min_sub_topics: 6,
            max_sub_topics: 4,
            ..ResearchConfig::default()
        };
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_check_rejects_zero_attempts() {
        let config = ResearchConfig {
            max_attempts: 0,
            ..ResearchConfig::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_validate_warnings() {
        assert!(ResearchConfig::default().validate().is_empty());

        let config = ResearchConfig {
            cooldown_secs: 0,
            tool_variants: Vec::new(),
            preferred_tool: Some("google_search".into()),
            ..ResearchConfig::default()
        };
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_validate_warns_on_low_server_wait_ceiling() {
        let config = ResearchConfig {
            max_server_wait_secs: 30,
            ..ResearchConfig::default()
        };
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("max_server_wait_secs"));
    }

    #[test]
    fn test_preferred_tool_and_variants() {
        let config = ResearchConfig {
            preferred_tool: Some("google_search_retrieval".into()),
            ..ResearchConfig::default()
        };
        assert_eq!(
            config.preferred_tool(),
            Some(ToolVariant::new("google_search_retrieval"))
        );
        assert_eq!(config.tool_variants().len(), 3);
        assert_eq!(config.cooldown(), Duration::from_secs(10));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = DelveConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: DelveConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.llm.fast_model, config.llm.fast_model);
        assert_eq!(
            deserialized.research.tool_variants,
            config.research.tool_variants
        );
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = DelveConfig::default();
        overrides.llm.synthesis_model = "gemini-exp".to_string();
        overrides.research = ResearchConfig::deep();

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.llm.synthesis_model, "gemini-exp");
        assert_eq!(config.research.max_sub_topics, 7);
    }

    #[test]
    fn test_load_config_from_workspace() {
        // Jail serializes env access with the env-layer test below.
        figment::Jail::expect_with(|jail| {
            jail.create_dir(".delve")?;
            jail.create_file(
                ".delve/config.toml",
                r#"
[research]
cooldown_secs = 2
max_attempts = 5
tool_variants = ["google_search_retrieval"]

[server]
port = 8080
"#,
            )?;

            let config = load_config(Some(jail.directory()), None).map_err(|e| *e)?;
            assert_eq!(config.research.cooldown_secs, 2);
            assert_eq!(config.research.max_attempts, 5);
            assert_eq!(
                config.research.tool_variants,
                vec!["google_search_retrieval".to_string()]
            );
            // Unset keys keep their defaults.
            assert_eq!(config.research.max_backoff_secs, 60);
            assert_eq!(config.research.max_server_wait_secs, 600);
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.server.host, "127.0.0.1");
            Ok(())
        });
    }

    #[test]
    fn test_load_config_env_layers() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir(".delve")?;
            jail.create_file(
                ".delve/config.toml",
                "[research]\ncooldown_secs = 2\nmax_attempts = 5\n",
            )?;
            jail.set_env("DELVE_RESEARCH__COOLDOWN_SECS", "3");
            jail.set_env("DELVE_LLM__SYNTHESIS_MODEL", "gemini-env-pro");
            jail.set_env("RESEARCH_MODEL", "gemini-env-flash");

            let config = load_config(Some(jail.directory()), None).map_err(|e| *e)?;
            assert_eq!(config.research.cooldown_secs, 3);
            assert_eq!(config.research.max_attempts, 5);
            assert_eq!(config.llm.fast_model, "gemini-env-flash");
            assert_eq!(config.llm.synthesis_model, "gemini-env-pro");

            let mut overrides = config.clone();
            overrides.llm.fast_model = "gemini-cli-flash".to_string();
            let config = load_config(Some(jail.directory()), Some(&overrides)).map_err(|e| *e)?;
            assert_eq!(config.llm.fast_model, "gemini-cli-flash");
            Ok(())
        });
    }
}
