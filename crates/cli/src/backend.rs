//! Provider selection.

use crate::config::{ConfigError, ModelConfig, Provider};
use agent::model::GenerateRequest;
use agent::{AnthropicBackend, Backend, Generation, ModelError, OpenAiBackend};

/// The backend chosen by configuration.
pub enum ModelBackend {
    OpenAi(OpenAiBackend),
    Anthropic(AnthropicBackend),
}

impl ModelBackend {
    pub fn from_config(config: &ModelConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key()?;
        let model = config.model_name();

        Ok(match config.provider {
            Provider::OpenAi => {
                let mut builder = OpenAiBackend::builder(api_key).model(model);
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                ModelBackend::OpenAi(builder.build())
            }
            Provider::Anthropic => {
                let mut builder = AnthropicBackend::builder(api_key, model);
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                ModelBackend::Anthropic(builder.build())
            }
        })
    }
}

impl Backend for ModelBackend {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, ModelError> {
        match self {
            ModelBackend::OpenAi(backend) => backend.generate(request).await,
            ModelBackend::Anthropic(backend) => backend.generate(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_api_key() {
        let config = ModelConfig::default();
        assert!(matches!(
            ModelBackend::from_config(&config),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn selects_provider() {
        let mut config = ModelConfig {
            api_key: Some("sk-test".into()),
            ..ModelConfig::default()
        };
        assert!(matches!(
            ModelBackend::from_config(&config),
            Ok(ModelBackend::OpenAi(_))
        ));

        config.provider = Provider::Anthropic;
        config.base_url = Some("http://localhost:9000/v1".into());
        assert!(matches!(
            ModelBackend::from_config(&config),
            Ok(ModelBackend::Anthropic(_))
        ));
    }
}
