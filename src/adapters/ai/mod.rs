//! Provider adapters implementing the Participant port.
//!
//! - [`AnthropicParticipant`] - Anthropic Messages API
//! - [`OpenAiParticipant`] - OpenAI Chat Completions API
//! - [`MockParticipant`] - scripted adapter for tests
//! - [`ProviderFactory`] - resolves adapters from credentials

mod anthropic;
mod factory;
mod mock;
mod openai;
mod retry;

pub use anthropic::{AnthropicConfig, AnthropicParticipant};
pub use factory::ProviderFactory;
pub use mock::{MockError, MockFactory, MockParticipant};
pub use openai::{OpenAiConfig, OpenAiParticipant};
