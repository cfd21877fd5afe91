//! Application layer - conversation orchestration.
//!
//! The registry owns every conversation; each conversation pairs a
//! [`ConversationHandle`] (shared state and control surface) with a
//! spawned turn loop that drives it to a terminal state.

mod engine;
mod error;
mod handle;
mod registry;

pub use error::OrchestratorError;
pub use handle::{ConversationHandle, ConversationSnapshot, Subscription};
pub use registry::ConversationRegistry;
