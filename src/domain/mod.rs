//! Domain layer: conversation value objects and in-memory state.

pub mod conversation;
pub mod errors;

pub use errors::ValidationError;
