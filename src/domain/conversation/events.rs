//! Events fanned out to live subscribers.

use serde::Serialize;

use super::message::ChatMessage;
use super::status::ConversationStatus;

/// One item in a conversation's live event stream.
///
/// Delivered over a `tokio::sync::broadcast` channel so a slow or
/// disconnected subscriber can never block the turn loop; lagging
/// subscribers skip ahead and disconnected ones are pruned lazily by
/// the channel itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A message was appended to the log.
    Message(ChatMessage),
    /// The conversation status changed.
    Status {
        status: ConversationStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ConversationEvent {
    /// Creates a status-change event without error detail.
    pub fn status(status: ConversationStatus) -> Self {
        Self::Status {
            status,
            error: None,
        }
    }

    /// Creates an error status event carrying the recorded detail.
    pub fn error(detail: impl Into<String>) -> Self {
        Self::Status {
            status: ConversationStatus::Error,
            error: Some(detail.into()),
        }
    }

    /// Returns true if this event ends subscriber streams.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Status { status, .. } if status.is_terminal())
    }

    /// The SSE event name for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Status { .. } => "status",
        }
    }
}
