//! Anthropic participant - Implementation of the Participant port for
//! the Anthropic Messages API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = AnthropicConfig::new(api_key)
//!     .with_base_url("https://api.anthropic.com")
//!     .with_max_retries(3);
//!
//! let participant = AnthropicParticipant::new(config);
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::with_backoff;
use crate::ports::{Participant, ProviderError, ProviderRole, TurnRequest};

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic participant adapter.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Base URL for the API (default: https://api.anthropic.com).
    pub base_url: String,
    /// Per-request timeout; exceeding it counts as a transient failure.
    pub timeout: Duration,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
}

impl AnthropicConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 3,
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Anthropic Messages API adapter.
///
/// One instance serves every conversation participant configured with
/// the `anthropic` provider; the model comes from the per-turn request.
pub struct AnthropicParticipant {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicParticipant {
    /// Creates a new Anthropic participant with the given configuration.
    pub fn new(config: AnthropicConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Builds the messages endpoint URL.
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// Converts a turn request to Anthropic's wire format.
    ///
    /// Anthropic keeps the system instruction out of the messages array
    /// and requires the conversation to open with a user turn, so a
    /// synthetic user message is prepended when the mapped history is
    /// empty or starts with the speaker's own (assistant) turn.
    fn to_wire_request(&self, request: &TurnRequest) -> AnthropicRequest {
        let mut messages: Vec<AnthropicMessage> = request
            .dialogue()
            .into_iter()
            .map(|msg| AnthropicMessage {
                role: match msg.role {
                    ProviderRole::Assistant => "assistant".to_string(),
                    _ => "user".to_string(),
                },
                content: msg.content,
            })
            .collect();

        if messages.first().map_or(true, |m| m.role != "user") {
            messages.insert(
                0,
                AnthropicMessage {
                    role: "user".to_string(),
                    content: "Please respond to the following conversation.".to_string(),
                },
            );
        }

        AnthropicRequest {
            model: request.config.model.clone(),
            messages,
            system: Some(request.system_prompt()),
            max_tokens: request.max_tokens,
            temperature: request.config.temperature,
        }
    }

    /// Sends one attempt and maps transport failures.
    async fn send_request(&self, request: &TurnRequest) -> Result<Response, ProviderError> {
        let wire_request = self.to_wire_request(request);

        self.client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    ProviderError::network(format!("Connection failed: {}", e))
                } else {
                    ProviderError::network(e.to_string())
                }
            })
    }

    /// Classifies non-success statuses into provider errors.
    async fn handle_response_status(&self, response: Response) -> Result<Response, ProviderError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => Err(ProviderError::AuthenticationFailed),
            429 => Err(ProviderError::rate_limited(retry_after.unwrap_or(60))),
            400 | 404 | 422 => Err(ProviderError::InvalidRequest(error_body)),
            500..=599 => Err(ProviderError::unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(ProviderError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    /// Parses a successful response into the reply text.
    async fn parse_response(&self, response: Response) -> Result<String, ProviderError> {
        let wire_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::parse(format!("Failed to parse response: {}", e)))?;

        let content = wire_response
            .content
            .into_iter()
            .filter_map(|block| {
                if block.block_type == "text" {
                    block.text
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(ProviderError::parse("Response contained no text content"));
        }

        Ok(content)
    }

    /// One full request/response attempt.
    async fn attempt(&self, request: &TurnRequest) -> Result<String, ProviderError> {
        let response = self.send_request(request).await?;
        let response = self.handle_response_status(response).await?;
        self.parse_response(response).await
    }
}

#[async_trait]
impl Participant for AnthropicParticipant {
    async fn produce(&self, request: TurnRequest) -> Result<String, ProviderError> {
        with_backoff(self.config.max_retries, || self.attempt(&request)).await
    }
}

// ----- Anthropic API Types -----

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{
        ChatMessage, ConversationId, ParticipantConfig, Provider, Speaker,
    };

    fn participant() -> AnthropicParticipant {
        AnthropicParticipant::new(AnthropicConfig::new("test-key"))
    }

    fn turn_request(history: Vec<ChatMessage>) -> TurnRequest {
        TurnRequest {
            speaker: Speaker::One,
            history,
            config: ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307")
                .with_temperature(0.6),
            initial_prompt: "hello".to_string(),
            max_tokens: 400,
        }
    }

    #[test]
    fn config_builder_works() {
        let config = AnthropicConfig::new("test-key")
            .with_base_url("https://custom.api.com")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn empty_history_gets_synthetic_user_opener() {
        let wire = participant().to_wire_request(&turn_request(vec![]));

        assert_eq!(wire.model, "claude-3-haiku-20240307");
        assert_eq!(wire.max_tokens, 400);
        assert_eq!(wire.temperature, Some(0.6));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert!(wire
            .system
            .as_deref()
            .is_some_and(|s| s.contains("Respond to this initial prompt: hello")));
    }

    #[test]
    fn assistant_first_history_gets_synthetic_user_opener() {
        let conversation = ConversationId::new();
        // Speaker::One's own message maps to assistant, which Anthropic
        // rejects as an opener.
        let history = vec![ChatMessage::new(conversation, Speaker::One, "my opener")];
        let wire = participant().to_wire_request(&turn_request(history));

        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(
            wire.messages[0].content,
            "Please respond to the following conversation."
        );
        assert_eq!(wire.messages[1].role, "assistant");
    }

    #[test]
    fn user_first_history_is_passed_through() {
        let conversation = ConversationId::new();
        let history = vec![
            ChatMessage::new(conversation, Speaker::Two, "their opener"),
            ChatMessage::new(conversation, Speaker::One, "my reply"),
        ];
        let wire = participant().to_wire_request(&turn_request(history));

        assert_eq!(
            wire.messages,
            vec![
                AnthropicMessage {
                    role: "user".to_string(),
                    content: "their opener".to_string()
                },
                AnthropicMessage {
                    role: "assistant".to_string(),
                    content: "my reply".to_string()
                },
            ]
        );
    }

    #[test]
    fn request_serializes_without_absent_fields() {
        let mut request = turn_request(vec![]);
        request.config.temperature = None;
        let wire = participant().to_wire_request(&request);

        let json = serde_json::to_string(&wire).unwrap();
        assert!(!json.contains("temperature"));
        assert!(json.contains("\"max_tokens\":400"));
    }
}
