//! Conversation domain model.
//!
//! Value objects for a two-participant AI conversation: identifiers,
//! configuration, messages, the append-only log, lifecycle status and
//! subscriber events. The runtime that drives these lives in
//! [`crate::application`].

mod config;
mod events;
mod ids;
mod log;
mod message;
mod status;

pub use config::{
    ConversationConfig, ParticipantConfig, ParticipantPatch, Provider, MESSAGE_LIMIT_RANGE,
};
pub use events::ConversationEvent;
pub use ids::{ConversationId, MessageId};
pub use log::MessageLog;
pub use message::{ChatMessage, Sender, Speaker};
pub use status::ConversationStatus;
