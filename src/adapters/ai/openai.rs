//! OpenAI participant - Implementation of the Participant port for the
//! OpenAI Chat Completions API.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::with_backoff;
use crate::ports::{Participant, ProviderError, ProviderRole, TurnRequest};

/// Configuration for the OpenAI participant adapter.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Base URL for the API (default: https://api.openai.com).
    pub base_url: String,
    /// Per-request timeout; exceeding it counts as a transient failure.
    pub timeout: Duration,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
}

impl OpenAiConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "https://api.openai.com".to_string(),
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

/// OpenAI Chat Completions adapter.
///
/// Unlike Anthropic, OpenAI takes the system instruction as the first
/// element of the messages array and has no role-alternation rule, so
/// the mapped history is passed through untouched.
pub struct OpenAiParticipant {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiParticipant {
    /// Creates a new OpenAI participant with the given configuration.
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Builds the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url)
    }

    /// Converts a turn request to OpenAI's wire format.
    fn to_wire_request(&self, request: &TurnRequest) -> OpenAiRequest {
        let mut messages = vec![OpenAiMessage {
            role: "system".to_string(),
            content: request.system_prompt(),
        }];

        messages.extend(request.dialogue().into_iter().map(|msg| OpenAiMessage {
            role: match msg.role {
                ProviderRole::Assistant => "assistant".to_string(),
                _ => "user".to_string(),
            },
            content: msg.content,
        }));

        OpenAiRequest {
            model: request.config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.config.temperature,
        }
    }

    /// Sends one attempt and maps transport failures.
    async fn send_request(&self, request: &TurnRequest) -> Result<Response, ProviderError> {
        let wire_request = self.to_wire_request(request);

        self.client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key())
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
            429 => Err(ProviderError::rate_limited(retry_after.unwrap_or(20))),
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
        let wire_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::parse(format!("Failed to parse response: {}", e)))?;

        wire_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::parse("Response contained no choices"))
    }

    /// One full request/response attempt.
    async fn attempt(&self, request: &TurnRequest) -> Result<String, ProviderError> {
        let response = self.send_request(request).await?;
        let response = self.handle_response_status(response).await?;
        self.parse_response(response).await
    }
}

#[async_trait]
impl Participant for OpenAiParticipant {
    async fn produce(&self, request: TurnRequest) -> Result<String, ProviderError> {
        with_backoff(self.config.max_retries, || self.attempt(&request)).await
    }
}

// ----- OpenAI API Types -----

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{
        ChatMessage, ConversationId, ParticipantConfig, Provider, Speaker,
    };

    fn participant() -> OpenAiParticipant {
        OpenAiParticipant::new(OpenAiConfig::new("sk-test"))
    }

    fn turn_request(history: Vec<ChatMessage>) -> TurnRequest {
        TurnRequest {
            speaker: Speaker::Two,
            history,
            config: ParticipantConfig::new(Provider::OpenAi, "gpt-4o-mini"),
            initial_prompt: "hello".to_string(),
            max_tokens: 500,
        }
    }

    #[test]
    fn config_builder_works() {
        let config = OpenAiConfig::new("sk-test")
            .with_base_url("https://proxy.example.com")
            .with_timeout(Duration::from_secs(45))
            .with_max_retries(1);

        assert_eq!(config.base_url, "https://proxy.example.com");
        assert_eq!(config.timeout, Duration::from_secs(45));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.api_key(), "sk-test");
    }

    #[test]
    fn system_prompt_leads_the_messages() {
        let conversation = ConversationId::new();
        let history = vec![ChatMessage::new(conversation, Speaker::One, "their turn")];
        let wire = participant().to_wire_request(&turn_request(history));

        assert_eq!(wire.model, "gpt-4o-mini");
        assert_eq!(wire.messages[0].role, "system");
        assert!(wire.messages[0].content.contains("You are PARTICIPANT-2."));
        assert_eq!(
            wire.messages[1],
            OpenAiMessage {
                role: "user".to_string(),
                content: "their turn".to_string()
            }
        );
    }

    #[test]
    fn empty_history_has_only_the_system_message() {
        let wire = participant().to_wire_request(&turn_request(vec![]));
        assert_eq!(wire.messages.len(), 1);
        assert!(wire.messages[0]
            .content
            .contains("Respond to this initial prompt: hello"));
    }

    #[test]
    fn parse_rejects_empty_choices() {
        // Exercised indirectly: a deserialized empty body maps to Parse.
        let wire: OpenAiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(wire.choices.is_empty());
    }
}
