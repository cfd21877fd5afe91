//! Data transfer objects for conversation endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::ConversationSnapshot;
use crate::domain::conversation::{
    ChatMessage, ConversationConfig, ConversationId, ConversationStatus, ParticipantConfig,
};

/// Response for a freshly created conversation.
#[derive(Debug, Serialize)]
pub struct ConversationCreated {
    pub id: ConversationId,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
}

/// Full conversation view, also embedded in exports.
#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    pub id: ConversationId,
    pub status: ConversationStatus,
    pub config: ConversationConfig,
    pub messages: Vec<ChatMessage>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ConversationSnapshot> for ConversationDetail {
    fn from(snapshot: ConversationSnapshot) -> Self {
        Self {
            id: snapshot.id,
            status: snapshot.status,
            config: snapshot.config,
            message_count: snapshot.messages.len(),
            messages: snapshot.messages,
            created_at: snapshot.created_at,
            finished_at: snapshot.finished_at,
            error: snapshot.error_detail,
        }
    }
}

/// Acknowledgement for pause/resume/stop.
///
/// A stop is honored at the loop's next checkpoint, so the status in
/// this response may still read `running` immediately after a stop
/// request.
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub id: ConversationId,
    pub status: ConversationStatus,
}

/// Response for a participant patch: the configuration now in effect.
#[derive(Debug, Serialize)]
pub struct PatchResponse {
    pub id: ConversationId,
    pub participant: u8,
    pub config: ParticipantConfig,
}

/// Versioned download document.
#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub export_version: &'static str,
    pub exported_at: DateTime<Utc>,
    pub conversation: ConversationDetail,
}

impl ExportDocument {
    pub const VERSION: &'static str = "1.0";

    pub fn new(snapshot: ConversationSnapshot) -> Self {
        Self {
            export_version: Self::VERSION,
            exported_at: Utc::now(),
            conversation: snapshot.into(),
        }
    }

    /// Suggested download filename.
    pub fn filename(&self) -> String {
        format!(
            "parley_conversation_{}_{}.json",
            self.conversation.id.short(),
            self.exported_at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            code: "CONFLICT".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{Provider, Speaker};

    fn snapshot() -> ConversationSnapshot {
        let id = ConversationId::new();
        ConversationSnapshot {
            id,
            status: ConversationStatus::Completed,
            config: ConversationConfig {
                participant_one: ParticipantConfig::new(
                    Provider::Anthropic,
                    "claude-3-haiku-20240307",
                ),
                participant_two: ParticipantConfig::new(Provider::OpenAi, "gpt-4o-mini"),
                initial_prompt: "hello".to_string(),
                message_limit: 2,
                turn_delay_ms: 0,
                max_tokens_per_reply: 500,
            },
            messages: vec![ChatMessage::new(id, Speaker::One, "hi")],
            created_at: Utc::now(),
            finished_at: Some(Utc::now()),
            error_detail: None,
        }
    }

    #[test]
    fn detail_counts_messages_and_omits_absent_error() {
        let detail = ConversationDetail::from(snapshot());
        assert_eq!(detail.message_count, 1);

        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains(r#""status":"completed""#));
        assert!(!json.contains(r#""error""#));
    }

    #[test]
    fn export_filename_embeds_short_id() {
        let export = ExportDocument::new(snapshot());
        let filename = export.filename();
        assert!(filename.starts_with("parley_conversation_"));
        assert!(filename.ends_with(".json"));
        assert!(filename.contains(&export.conversation.id.short()));
    }

    #[test]
    fn export_carries_its_version() {
        let export = ExportDocument::new(snapshot());
        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains(r#""export_version":"1.0""#));
    }

    #[test]
    fn error_responses_carry_stable_codes() {
        assert_eq!(ErrorResponse::bad_request("x").code, "BAD_REQUEST");
        assert_eq!(ErrorResponse::not_found("x").code, "NOT_FOUND");
        assert_eq!(ErrorResponse::conflict("x").code, "CONFLICT");
        assert_eq!(ErrorResponse::internal("x").code, "INTERNAL_ERROR");
    }
}
