//! Mock participant for testing.
//!
//! Provides a configurable mock implementation of the Participant port,
//! allowing orchestration tests to run without calling real AI APIs.
//!
//! # Features
//!
//! - Pre-scripted replies consumed in order, with an echo fallback
//! - Error injection for resilience testing
//! - Simulated latency for pause/stop race testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let participant = MockParticipant::new("alice")
//!     .with_reply("Hello there!")
//!     .with_error(MockError::AuthenticationFailed);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::conversation::{ParticipantConfig, Provider};
use crate::ports::{Participant, ParticipantFactory, ProviderError, TurnRequest};

/// A scripted reply or failure.
#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(MockError),
}

/// Cloneable error shapes for scripting failures.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Transient: rate limited.
    RateLimited { retry_after_secs: u32 },
    /// Transient: network failure.
    Network { message: String },
    /// Transient: provider down.
    Unavailable { message: String },
    /// Permanent: bad credentials.
    AuthenticationFailed,
    /// Permanent: rejected request (e.g. unknown model).
    InvalidRequest { message: String },
}

impl From<MockError> for ProviderError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => {
                ProviderError::rate_limited(retry_after_secs)
            }
            MockError::Network { message } => ProviderError::network(message),
            MockError::Unavailable { message } => ProviderError::unavailable(message),
            MockError::AuthenticationFailed => ProviderError::AuthenticationFailed,
            MockError::InvalidRequest { message } => ProviderError::InvalidRequest(message),
        }
    }
}

/// Mock participant with scripted behavior and call tracking.
///
/// When the script runs out, replies fall back to
/// `"{name} reply {call_number}"` so turn loops can run to an arbitrary
/// message limit without scripting every reply.
#[derive(Debug, Clone)]
pub struct MockParticipant {
    name: String,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<TurnRequest>>>,
}

impl MockParticipant {
    /// Creates a mock with no scripted replies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a successful reply.
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .push_back(Scripted::Reply(content.into()));
        self
    }

    /// Queues a failure.
    pub fn with_error(self, error: MockError) -> Self {
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .push_back(Scripted::Fail(error));
        self
    }

    /// Adds simulated latency to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns every request received so far.
    pub fn calls(&self) -> Vec<TurnRequest> {
        self.calls.lock().expect("mock calls lock poisoned").clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock calls lock poisoned").len()
    }
}

#[async_trait]
impl Participant for MockParticipant {
    async fn produce(&self, request: TurnRequest) -> Result<String, ProviderError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let call_number = {
            let mut calls = self.calls.lock().expect("mock calls lock poisoned");
            calls.push(request);
            calls.len()
        };

        let scripted = self
            .script
            .lock()
            .expect("mock script lock poisoned")
            .pop_front();

        match scripted {
            Some(Scripted::Reply(content)) => Ok(content),
            Some(Scripted::Fail(error)) => Err(error.into()),
            None => Ok(format!("{} reply {}", self.name, call_number)),
        }
    }
}

/// Factory pairing one mock per provider slot, for orchestration tests.
///
/// Conversations configured with `anthropic` resolve to the first mock
/// and `openai` to the second, letting tests target each participant
/// independently.
#[derive(Debug, Clone)]
pub struct MockFactory {
    anthropic: MockParticipant,
    openai: MockParticipant,
}

impl MockFactory {
    /// Creates a factory from the two mocks.
    pub fn new(anthropic: MockParticipant, openai: MockParticipant) -> Self {
        Self { anthropic, openai }
    }

    /// The mock serving `anthropic` participants.
    pub fn anthropic(&self) -> &MockParticipant {
        &self.anthropic
    }

    /// The mock serving `openai` participants.
    pub fn openai(&self) -> &MockParticipant {
        &self.openai
    }
}

impl ParticipantFactory for MockFactory {
    fn participant_for(
        &self,
        config: &ParticipantConfig,
    ) -> Result<Arc<dyn Participant>, crate::domain::ValidationError> {
        match config.provider {
            Provider::Anthropic => Ok(Arc::new(self.anthropic.clone())),
            Provider::OpenAi => Ok(Arc::new(self.openai.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::Speaker;

    fn request() -> TurnRequest {
        TurnRequest {
            speaker: Speaker::One,
            history: vec![],
            config: ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307"),
            initial_prompt: "hi".to_string(),
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn scripted_replies_are_consumed_in_order() {
        let mock = MockParticipant::new("m").with_reply("one").with_reply("two");

        assert_eq!(mock.produce(request()).await.unwrap(), "one");
        assert_eq!(mock.produce(request()).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn exhausted_script_falls_back_to_echo() {
        let mock = MockParticipant::new("alice");
        assert_eq!(mock.produce(request()).await.unwrap(), "alice reply 1");
        assert_eq!(mock.produce(request()).await.unwrap(), "alice reply 2");
    }

    #[tokio::test]
    async fn scripted_errors_surface_as_provider_errors() {
        let mock = MockParticipant::new("m").with_error(MockError::AuthenticationFailed);
        let err = mock.produce(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn calls_are_tracked() {
        let mock = MockParticipant::new("m");
        mock.produce(request()).await.unwrap();

        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0].speaker, Speaker::One);
    }

    #[tokio::test]
    async fn factory_routes_by_provider() {
        let factory = MockFactory::new(MockParticipant::new("a"), MockParticipant::new("b"));

        let anthropic_cfg = ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307");
        let openai_cfg = ParticipantConfig::new(Provider::OpenAi, "gpt-4o-mini");

        let a = factory.participant_for(&anthropic_cfg).unwrap();
        let b = factory.participant_for(&openai_cfg).unwrap();

        assert_eq!(a.produce(request()).await.unwrap(), "a reply 1");
        assert_eq!(b.produce(request()).await.unwrap(), "b reply 1");
    }
}
