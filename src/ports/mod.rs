//! Ports: interfaces between the orchestration core and the outside world.

mod participant;

pub use participant::{
    Participant, ParticipantFactory, ProviderError, ProviderMessage, ProviderRole, TurnRequest,
};
