//! Conversation and participant configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::message::Speaker;
use crate::domain::errors::ValidationError;

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Per-participant configuration.
///
/// Provider and model are fixed at creation; persona and temperature
/// may be patched while the conversation is non-terminal. The turn loop
/// re-reads this struct at the start of every turn, so a patch takes
/// effect from the next turn onward and never alters one in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantConfig {
    /// Backend family serving this participant.
    pub provider: Provider,
    /// Model identifier, passed through to the provider.
    pub model: String,
    /// Persona text injected as a system-level instruction on every call.
    #[serde(default)]
    pub persona: Option<String>,
    /// Sampling temperature (0.0..=2.0).
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ParticipantConfig {
    /// Creates a participant configuration with no persona.
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            persona: None,
            temperature: None,
        }
    }

    /// Sets the persona text.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Validate participant configuration.
    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::empty_field(format!("{}.model", field)));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ValidationError::invalid_format(
                    format!("{}.temperature", field),
                    format!("must be within 0.0..=2.0, got {}", temperature),
                ));
            }
        }
        Ok(())
    }
}

/// A mid-run edit to a participant.
///
/// Only persona and temperature are editable; absent fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticipantPatch {
    pub persona: Option<String>,
    pub temperature: Option<f32>,
}

impl ParticipantPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.persona.is_none() && self.temperature.is_none()
    }

    /// Validates patch fields against the same bounds as creation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ValidationError::invalid_format(
                    "temperature",
                    format!("must be within 0.0..=2.0, got {}", temperature),
                ));
            }
        }
        Ok(())
    }

    /// Applies the patch to a participant configuration.
    pub fn apply(&self, config: &mut ParticipantConfig) {
        if let Some(persona) = &self.persona {
            config.persona = Some(persona.clone());
        }
        if let Some(temperature) = self.temperature {
            config.temperature = Some(temperature);
        }
    }
}

/// Bounds mirrored by [`ConversationConfig::validate`].
pub const MESSAGE_LIMIT_RANGE: (u32, u32) = (1, 1000);
const TURN_DELAY_RANGE_MS: (u64, u64) = (0, 60_000);
const MAX_TOKENS_RANGE: (u32, u32) = (50, 4000);

/// Immutable conversation configuration, fixed at creation except for
/// the per-participant persona/temperature patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Participant answering even-numbered turns.
    pub participant_one: ParticipantConfig,
    /// Participant answering odd-numbered turns.
    pub participant_two: ParticipantConfig,
    /// Seed prompt the first turn responds to.
    pub initial_prompt: String,
    /// Hard cap on participant messages.
    #[serde(default = "default_message_limit")]
    pub message_limit: u32,
    /// Delay between turns, in milliseconds.
    #[serde(default = "default_turn_delay_ms")]
    pub turn_delay_ms: u64,
    /// Token budget per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_reply: u32,
}

impl ConversationConfig {
    /// Returns the configuration of the given speaker.
    pub fn participant(&self, speaker: Speaker) -> &ParticipantConfig {
        match speaker {
            Speaker::One => &self.participant_one,
            Speaker::Two => &self.participant_two,
        }
    }

    /// Mutable access for patching.
    pub fn participant_mut(&mut self, speaker: Speaker) -> &mut ParticipantConfig {
        match speaker {
            Speaker::One => &mut self.participant_one,
            Speaker::Two => &mut self.participant_two,
        }
    }

    /// Inter-turn delay as a Duration.
    pub fn turn_delay(&self) -> Duration {
        Duration::from_millis(self.turn_delay_ms)
    }

    /// Validate configuration bounds before any state is created.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_prompt.trim().is_empty() {
            return Err(ValidationError::empty_field("initial_prompt"));
        }
        let (min, max) = MESSAGE_LIMIT_RANGE;
        if !(min..=max).contains(&self.message_limit) {
            return Err(ValidationError::out_of_range(
                "message_limit",
                min as i64,
                max as i64,
                self.message_limit as i64,
            ));
        }
        let (min, max) = TURN_DELAY_RANGE_MS;
        if !(min..=max).contains(&self.turn_delay_ms) {
            return Err(ValidationError::out_of_range(
                "turn_delay_ms",
                min as i64,
                max as i64,
                self.turn_delay_ms as i64,
            ));
        }
        let (min, max) = MAX_TOKENS_RANGE;
        if !(min..=max).contains(&self.max_tokens_per_reply) {
            return Err(ValidationError::out_of_range(
                "max_tokens_per_reply",
                min as i64,
                max as i64,
                self.max_tokens_per_reply as i64,
            ));
        }
        self.participant_one.validate("participant_one")?;
        self.participant_two.validate("participant_two")?;
        Ok(())
    }
}

fn default_message_limit() -> u32 {
    50
}

fn default_turn_delay_ms() -> u64 {
    1000
}

fn default_max_tokens() -> u32 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ConversationConfig {
        ConversationConfig {
            participant_one: ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307"),
            participant_two: ParticipantConfig::new(Provider::OpenAi, "gpt-4o-mini"),
            initial_prompt: "Discuss the weather".to_string(),
            message_limit: 10,
            turn_delay_ms: 0,
            max_tokens_per_reply: 500,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn defaults_are_applied_on_deserialization() {
        let json = r#"{
            "participant_one": {"provider": "anthropic", "model": "claude-3-haiku-20240307"},
            "participant_two": {"provider": "openai", "model": "gpt-4o-mini"},
            "initial_prompt": "hello"
        }"#;
        let config: ConversationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.message_limit, 50);
        assert_eq!(config.turn_delay_ms, 1000);
        assert_eq!(config.max_tokens_per_reply, 500);
    }

    #[test]
    fn blank_initial_prompt_is_rejected() {
        let mut config = valid_config();
        config.initial_prompt = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn message_limit_bounds_are_enforced() {
        let mut config = valid_config();
        config.message_limit = 0;
        assert!(config.validate().is_err());
        config.message_limit = 1001;
        assert!(config.validate().is_err());
        config.message_limit = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn turn_delay_upper_bound_is_enforced() {
        let mut config = valid_config();
        config.turn_delay_ms = 60_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_tokens_bounds_are_enforced() {
        let mut config = valid_config();
        config.max_tokens_per_reply = 49;
        assert!(config.validate().is_err());
        config.max_tokens_per_reply = 4001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_model_is_rejected() {
        let mut config = valid_config();
        config.participant_two.model = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("participant_two.model"));
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let mut config = valid_config();
        config.participant_one.temperature = Some(2.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn participant_lookup_follows_speaker() {
        let config = valid_config();
        assert_eq!(config.participant(Speaker::One).provider, Provider::Anthropic);
        assert_eq!(config.participant(Speaker::Two).provider, Provider::OpenAi);
    }

    mod patch {
        use super::*;

        #[test]
        fn empty_patch_is_detected() {
            assert!(ParticipantPatch::default().is_empty());
        }

        #[test]
        fn patch_applies_only_present_fields() {
            let mut config = ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307")
                .with_persona("a pirate")
                .with_temperature(0.7);

            let patch = ParticipantPatch {
                persona: Some("a poet".to_string()),
                temperature: None,
            };
            patch.apply(&mut config);

            assert_eq!(config.persona.as_deref(), Some("a poet"));
            assert_eq!(config.temperature, Some(0.7));
        }

        #[test]
        fn patch_temperature_is_validated() {
            let patch = ParticipantPatch {
                persona: None,
                temperature: Some(-0.1),
            };
            assert!(patch.validate().is_err());
        }
    }
}
