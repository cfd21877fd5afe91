//! Participant Port - Interface for LLM provider integrations.
//!
//! This port abstracts all interactions with AI/LLM providers, letting
//! the turn loop request "the next message from participant X given
//! history H" without coupling to a specific backend.
//!
//! # Design
//!
//! - One opaque async operation, [`Participant::produce`]
//! - Provider-agnostic role mapping: the speaker's own prior turns map
//!   to the assistant role, the other participant's turns to the user
//!   role, and system-sender log entries are skipped
//! - Persona text is re-derived into the system instruction on every
//!   call, never cached, so mid-run patches take effect next turn
//! - Transient failures (rate limit, timeout, network, unavailable)
//!   are retried inside the adapter with exponential backoff;
//!   everything else propagates immediately

use async_trait::async_trait;

use crate::domain::conversation::{ChatMessage, ParticipantConfig, Speaker};

/// Port for producing one conversational turn from an LLM backend.
///
/// Implementations connect to external AI services and translate
/// between the provider-specific API and our domain types. An adapter
/// owns its retry policy: when `produce` returns an error, retries are
/// already exhausted (or the error was never retryable).
#[async_trait]
pub trait Participant: Send + Sync {
    /// Produces the speaker's next message given the conversation so far.
    async fn produce(&self, request: TurnRequest) -> Result<String, ProviderError>;
}

/// Resolves the adapter serving a participant configuration.
///
/// Injected into the registry so conversation creation can fail fast
/// with a validation error when a participant names a provider that has
/// no credentials configured.
pub trait ParticipantFactory: Send + Sync {
    /// Returns the adapter for the participant's provider.
    fn participant_for(
        &self,
        config: &ParticipantConfig,
    ) -> Result<std::sync::Arc<dyn Participant>, crate::domain::ValidationError>;
}

/// Everything an adapter needs for one turn.
///
/// Built fresh by the turn loop at the start of each turn from the
/// current participant configuration.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Which participant is speaking.
    pub speaker: Speaker,
    /// Snapshot of the conversation history at turn start.
    pub history: Vec<ChatMessage>,
    /// The speaker's configuration as of this turn.
    pub config: ParticipantConfig,
    /// Seed prompt; consumed only while the history is empty.
    pub initial_prompt: String,
    /// Token budget for the reply.
    pub max_tokens: u32,
}

impl TurnRequest {
    /// Builds the system instruction for this call.
    ///
    /// Re-derived every call from the current persona. On the opening
    /// turn (empty history) the seed prompt is folded in so the first
    /// speaker has something to respond to.
    pub fn system_prompt(&self) -> String {
        let persona = self
            .config
            .persona
            .as_deref()
            .unwrap_or("You are a helpful AI assistant.");

        let persona = if self.history.is_empty() {
            format!(
                "{}\n\nRespond to this initial prompt: {}",
                persona, self.initial_prompt
            )
        } else {
            persona.to_string()
        };

        format!(
            "You are {}. {}\n\nYou are having a conversation with another AI. \
             Keep your responses conversational, thoughtful, and engaging. \
             Aim for 1-3 sentences unless the topic requires more depth.",
            self.speaker.label(),
            persona
        )
    }

    /// Maps the history into the provider role alternation for this
    /// speaker: own turns become assistant messages, the other
    /// participant's turns become user messages, system notices are
    /// dropped.
    pub fn dialogue(&self) -> Vec<ProviderMessage> {
        self.history
            .iter()
            .filter_map(|msg| {
                let speaker = msg.sender.speaker()?;
                let role = if speaker == self.speaker {
                    ProviderRole::Assistant
                } else {
                    ProviderRole::User
                };
                Some(ProviderMessage::new(role, msg.content.clone()))
            })
            .collect()
    }
}

/// A message in provider wire format.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProviderMessage {
    pub role: ProviderRole,
    pub content: String,
}

impl ProviderMessage {
    /// Creates a new provider message.
    pub fn new(role: ProviderRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ProviderRole::User, content)
    }

    /// Creates an assistant-role message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ProviderRole::Assistant, content)
    }
}

/// Role of a message from the provider's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    System,
    User,
    Assistant,
}

/// Provider adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Rate limited by the provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until retry is allowed.
        retry_after_secs: u32,
    },

    /// Request exceeded its deadline.
    #[error("request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u32,
    },

    /// Provider is unavailable (5xx).
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Network error during the request.
    #[error("network error: {0}")]
    Network(String),

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Failed to parse the provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The provider rejected the request (bad model, malformed body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Creates a rate limited error.
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Unavailable { .. } | Self::Network(_)
        )
    }
}
