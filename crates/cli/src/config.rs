//! Configuration loading from drone-agent.toml and the environment.

use agent::{DEFAULT_MAX_TOKENS, LoggingConfig};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE: &str = "drone-agent.toml";

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Top-level configuration. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub sim: SimConfig,
    pub logging: LoggingConfig,
}

/// Which vision-model API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI or any server speaking its chat completions API.
    #[default]
    OpenAi,
    Anthropic,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Model provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: Provider,

    /// Model name; each provider has its own default.
    pub model: Option<String>,

    /// API root, e.g. `http://localhost:8000/v1` for a local server.
    pub base_url: Option<String>,

    pub api_key: Option<String>,

    pub max_tokens: u32,

    /// JSON schema file the provider should constrain replies to.
    pub response_schema: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            base_url: None,
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            response_schema: None,
        }
    }
}

impl ModelConfig {
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, Provider::OpenAi) => agent::DEFAULT_MODEL,
            (None, Provider::Anthropic) => DEFAULT_ANTHROPIC_MODEL,
        }
    }

    /// The API key, which every provider requires.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Reads the configured response schema, if any.
    pub fn load_response_schema(&self) -> Result<Option<Value>, ConfigError> {
        let Some(path) = &self.response_schema else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path)?;
        let schema: Value = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Schema(format!("{}: {e}", path.display())))?;
        if !schema.is_object() {
            return Err(ConfigError::Schema(format!(
                "{}: expected a JSON object",
                path.display()
            )));
        }
        Ok(Some(schema))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Step budget for `run` unless overridden on the command line.
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_steps: 10 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// PNG returned by every simulated camera.
    pub placeholder_image: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Like [`load`](Self::load), but a missing file gives the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `MLLM_*` overrides from `lookup`, normally the process
    /// environment after `.env` has been loaded.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(provider) = var("MLLM_PROVIDER") {
            self.model.provider = provider.parse()?;
        }
        if let Some(model) = var("MLLM_MODEL") {
            self.model.model = Some(model);
        }
        if let Some(base_url) = var("MLLM_BASE_URL") {
            self.model.base_url = Some(base_url);
        }
        if let Some(api_key) = var("MLLM_API_KEY") {
            self.model.api_key = Some(api_key);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unknown model provider '{0}': expected openai or anthropic")]
    UnknownProvider(String),

    #[error("API key not configured: set model.api_key or MLLM_API_KEY")]
    MissingApiKey,

    #[error("invalid response schema {0}")]
    Schema(String),
}
