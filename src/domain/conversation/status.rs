//! Conversation status state machine.
//!
//! Defines the lifecycle states of a conversation and valid transitions.

use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;

/// The lifecycle state of a conversation.
///
/// Conversations move through these states from creation to a terminal
/// outcome:
/// - `Pending`: Created, turn loop not yet launched
/// - `Running`: Loop actively exchanging turns
/// - `Paused`: Loop idling between turns, resumable
/// - `Completed`: Message limit reached
/// - `Stopped`: Explicit user stop
/// - `Error`: Unrecoverable provider failure
///
/// `Completed`, `Stopped` and `Error` are terminal: no further
/// transition or message append is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Created, not yet started.
    #[default]
    Pending,

    /// Turn loop is active.
    Running,

    /// Idling until resumed or stopped.
    Paused,

    /// Turn limit reached, read-only.
    Completed,

    /// Explicitly stopped by the user, read-only.
    Stopped,

    /// Provider failure after retries, read-only.
    Error,
}

impl ConversationStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Error)
    }

    /// Returns true if transition from self to target is valid.
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, target),
            // Loop launched
            (Pending, Running) |
            // Stopped before the loop ever ran a turn
            (Pending, Stopped) |
            // Pause / resume are the only re-enterable transitions
            (Running, Paused) |
            (Paused, Running) |
            // Explicit stop, observed at a loop checkpoint
            (Running, Stopped) |
            (Paused, Stopped) |
            // Turn limit reached
            (Running, Completed) |
            // Provider failure; the failing turn may have been in flight
            // across a pause request
            (Running, Error) |
            (Paused, Error)
        )
    }

    /// Returns all valid target states from the current state.
    pub fn valid_transitions(&self) -> Vec<Self> {
        use ConversationStatus::*;
        match self {
            Pending => vec![Running, Stopped],
            Running => vec![Paused, Stopped, Completed, Error],
            Paused => vec![Running, Stopped, Error],
            Completed | Stopped | Error => vec![],
        }
    }

    /// Performs a transition with validation, returning an error if invalid.
    pub fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [ConversationStatus; 6] = [
        ConversationStatus::Pending,
        ConversationStatus::Running,
        ConversationStatus::Paused,
        ConversationStatus::Completed,
        ConversationStatus::Stopped,
        ConversationStatus::Error,
    ];

    #[test]
    fn default_state_is_pending() {
        assert_eq!(ConversationStatus::default(), ConversationStatus::Pending);
    }

    #[test]
    fn serializes_to_snake_case() {
        let json = serde_json::to_string(&ConversationStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn terminal_states_are_exactly_three() {
        let terminal: Vec<_> = ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![
                &ConversationStatus::Completed,
                &ConversationStatus::Stopped,
                &ConversationStatus::Error
            ]
        );
    }

    #[test]
    fn pause_and_resume_are_re_enterable() {
        let status = ConversationStatus::Running;
        let paused = status.transition_to(ConversationStatus::Paused).unwrap();
        let resumed = paused.transition_to(ConversationStatus::Running).unwrap();
        assert_eq!(resumed, ConversationStatus::Running);
    }

    #[test]
    fn stop_is_valid_from_running_and_paused() {
        assert!(ConversationStatus::Running.can_transition_to(&ConversationStatus::Stopped));
        assert!(ConversationStatus::Paused.can_transition_to(&ConversationStatus::Stopped));
    }

    #[test]
    fn completed_is_only_reachable_from_running() {
        for status in ALL {
            let valid = status.can_transition_to(&ConversationStatus::Completed);
            assert_eq!(valid, status == ConversationStatus::Running, "{:?}", status);
        }
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let result = ConversationStatus::Pending.transition_to(ConversationStatus::Completed);
        assert!(result.is_err());
    }

    #[test]
    fn valid_transitions_matches_can_transition_to() {
        for status in ALL {
            for target in ALL {
                let listed = status.valid_transitions().contains(&target);
                assert_eq!(listed, status.can_transition_to(&target));
            }
        }
    }

    proptest! {
        /// No sequence of transitions can ever leave a terminal state.
        #[test]
        fn terminal_states_are_absorbing(from in 0usize..6, to in 0usize..6) {
            let (from, to) = (ALL[from], ALL[to]);
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(&to));
            }
        }

        /// Every non-terminal state can eventually reach Stopped.
        #[test]
        fn non_terminal_states_can_stop(idx in 0usize..6) {
            let status = ALL[idx];
            if !status.is_terminal() {
                prop_assert!(status.can_transition_to(&ConversationStatus::Stopped));
            }
        }
    }
}
