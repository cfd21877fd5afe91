//! Provider factory - resolves participant adapters from credentials.

use std::sync::Arc;

use crate::config::AiConfig;
use crate::domain::conversation::{ParticipantConfig, Provider};
use crate::domain::ValidationError;
use crate::ports::{Participant, ParticipantFactory};

use super::anthropic::{AnthropicConfig, AnthropicParticipant};
use super::openai::{OpenAiConfig, OpenAiParticipant};

/// Resolves real provider adapters from the application's AI settings.
///
/// Adapters are constructed once at startup and shared across every
/// conversation; a provider without a configured API key resolves to a
/// validation error at conversation creation time.
pub struct ProviderFactory {
    anthropic: Option<Arc<AnthropicParticipant>>,
    openai: Option<Arc<OpenAiParticipant>>,
}

impl ProviderFactory {
    /// Builds adapters for every provider that has credentials.
    pub fn from_config(config: &AiConfig) -> Self {
        let anthropic = config
            .anthropic_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| {
                Arc::new(AnthropicParticipant::new(
                    AnthropicConfig::new(key.clone())
                        .with_base_url(config.anthropic_base_url.clone())
                        .with_timeout(config.timeout())
                        .with_max_retries(config.max_retries),
                ))
            });

        let openai = config
            .openai_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| {
                Arc::new(OpenAiParticipant::new(
                    OpenAiConfig::new(key.clone())
                        .with_base_url(config.openai_base_url.clone())
                        .with_timeout(config.timeout())
                        .with_max_retries(config.max_retries),
                ))
            });

        Self { anthropic, openai }
    }

    /// True if at least one provider is configured.
    pub fn has_any_provider(&self) -> bool {
        self.anthropic.is_some() || self.openai.is_some()
    }
}

impl ParticipantFactory for ProviderFactory {
    fn participant_for(
        &self,
        config: &ParticipantConfig,
    ) -> Result<Arc<dyn Participant>, ValidationError> {
        match config.provider {
            Provider::Anthropic => self
                .anthropic
                .clone()
                .map(|p| p as Arc<dyn Participant>)
                .ok_or_else(|| {
                    ValidationError::invalid_format(
                        "provider",
                        "anthropic is not configured (missing API key)",
                    )
                }),
            Provider::OpenAi => self
                .openai
                .clone()
                .map(|p| p as Arc<dyn Participant>)
                .ok_or_else(|| {
                    ValidationError::invalid_format(
                        "provider",
                        "openai is not configured (missing API key)",
                    )
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ai_config(anthropic: Option<&str>, openai: Option<&str>) -> AiConfig {
        AiConfig {
            anthropic_api_key: anthropic.map(String::from),
            openai_api_key: openai.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn configured_provider_resolves() {
        let factory = ProviderFactory::from_config(&ai_config(Some("sk-ant-test"), None));

        assert!(factory.has_any_provider());
        let config = ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307");
        assert!(factory.participant_for(&config).is_ok());
    }

    #[test]
    fn unconfigured_provider_is_a_validation_error() {
        let factory = ProviderFactory::from_config(&ai_config(Some("sk-ant-test"), None));

        let config = ParticipantConfig::new(Provider::OpenAi, "gpt-4o-mini");
        let err = factory.participant_for(&config).err().unwrap();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn empty_key_counts_as_unconfigured() {
        let factory = ProviderFactory::from_config(&ai_config(Some(""), Some("sk-test")));

        assert!(factory.has_any_provider());
        let config = ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307");
        assert!(factory.participant_for(&config).is_err());
    }
}
