//! Orchestration error taxonomy.

use thiserror::Error;

use crate::domain::conversation::{ConversationId, ConversationStatus};
use crate::domain::ValidationError;
use crate::ports::ProviderError;

/// Errors surfaced by the conversation registry and handles.
///
/// Provider failures inside a running turn loop do not surface here;
/// they terminate the conversation and are recorded as its error
/// detail. This enum covers the synchronous API surface only.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The supplied configuration or transition was invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    /// No conversation with the given id exists.
    #[error("conversation {0} not found")]
    NotFound(ConversationId),

    /// The conversation has reached a terminal state.
    #[error("conversation {id} is {status:?} and can no longer be modified")]
    ConversationTerminal {
        id: ConversationId,
        status: ConversationStatus,
    },

    /// The participant patch was empty or out of bounds.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// A provider call failed outside a turn loop.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
