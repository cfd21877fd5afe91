//! Chat messages and their senders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ConversationId, MessageId};

/// One of the two conversational participants.
///
/// Turn index parity selects the speaker deterministically: even turns
/// belong to participant one, odd turns to participant two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Speaker {
    #[serde(rename = "participant-1")]
    One,
    #[serde(rename = "participant-2")]
    Two,
}

impl Speaker {
    /// Selects the speaker for a given turn index.
    pub fn for_turn(turn_index: u32) -> Self {
        if turn_index % 2 == 0 {
            Self::One
        } else {
            Self::Two
        }
    }

    /// Returns the other participant.
    pub fn other(&self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// One-based participant index, as used in the patch API.
    pub fn index(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Builds a speaker from a one-based participant index.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    /// Display label used in provider system prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::One => "PARTICIPANT-1",
            Self::Two => "PARTICIPANT-2",
        }
    }
}

/// The sender tag attached to each stored message.
///
/// `System` is reserved for orchestrator-generated notices (e.g. the
/// error message appended when a provider fails).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "participant-1")]
    ParticipantOne,
    #[serde(rename = "participant-2")]
    ParticipantTwo,
    #[serde(rename = "system")]
    System,
}

impl Sender {
    /// Returns the speaker behind this sender, if it is a participant.
    pub fn speaker(&self) -> Option<Speaker> {
        match self {
            Self::ParticipantOne => Some(Speaker::One),
            Self::ParticipantTwo => Some(Speaker::Two),
            Self::System => None,
        }
    }
}

impl From<Speaker> for Sender {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::One => Self::ParticipantOne,
            Speaker::Two => Self::ParticipantTwo,
        }
    }
}

/// A single message in a conversation.
///
/// Immutable once appended to the message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique within the conversation.
    pub id: MessageId,
    /// Back-reference to the owning conversation.
    pub conversation_id: ConversationId,
    /// Who produced this message.
    pub sender: Sender,
    /// Message text.
    pub content: String,
    /// Creation time, UTC.
    pub timestamp: DateTime<Utc>,
    /// Completion token count, when the provider reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

impl ChatMessage {
    /// Creates a new message timestamped now.
    pub fn new(
        conversation_id: ConversationId,
        sender: impl Into<Sender>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender: sender.into(),
            content: content.into(),
            timestamp: Utc::now(),
            tokens: None,
        }
    }

    /// Attaches a completion token count.
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Creates an orchestrator-generated system notice.
    pub fn system(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Sender::System, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod speaker {
        use super::*;

        #[test]
        fn even_turns_belong_to_participant_one() {
            assert_eq!(Speaker::for_turn(0), Speaker::One);
            assert_eq!(Speaker::for_turn(1), Speaker::Two);
            assert_eq!(Speaker::for_turn(2), Speaker::One);
            assert_eq!(Speaker::for_turn(7), Speaker::Two);
        }

        #[test]
        fn other_flips_participants() {
            assert_eq!(Speaker::One.other(), Speaker::Two);
            assert_eq!(Speaker::Two.other(), Speaker::One);
        }

        #[test]
        fn index_round_trips() {
            assert_eq!(Speaker::from_index(1), Some(Speaker::One));
            assert_eq!(Speaker::from_index(2), Some(Speaker::Two));
            assert_eq!(Speaker::from_index(0), None);
            assert_eq!(Speaker::from_index(3), None);
        }

        proptest::proptest! {
            /// Consecutive turns always alternate speakers.
            #[test]
            fn consecutive_turns_alternate(turn in 0u32..10_000) {
                proptest::prop_assert_eq!(
                    Speaker::for_turn(turn).other(),
                    Speaker::for_turn(turn + 1)
                );
            }
        }
    }

    mod sender {
        use super::*;

        #[test]
        fn serializes_with_dashes() {
            let json = serde_json::to_string(&Sender::ParticipantOne).unwrap();
            assert_eq!(json, "\"participant-1\"");
            let json = serde_json::to_string(&Sender::System).unwrap();
            assert_eq!(json, "\"system\"");
        }

        #[test]
        fn system_sender_has_no_speaker() {
            assert_eq!(Sender::System.speaker(), None);
            assert_eq!(Sender::ParticipantTwo.speaker(), Some(Speaker::Two));
        }
    }

    mod chat_message {
        use super::*;

        #[test]
        fn new_message_has_fresh_id_and_no_tokens() {
            let conversation = ConversationId::new();
            let msg = ChatMessage::new(conversation, Speaker::One, "hello");
            assert_eq!(msg.conversation_id, conversation);
            assert_eq!(msg.sender, Sender::ParticipantOne);
            assert_eq!(msg.content, "hello");
            assert!(msg.tokens.is_none());
        }

        #[test]
        fn tokens_are_omitted_from_json_when_absent() {
            let msg = ChatMessage::new(ConversationId::new(), Speaker::One, "hi");
            let json = serde_json::to_string(&msg).unwrap();
            assert!(!json.contains("tokens"));

            let json = serde_json::to_string(&msg.with_tokens(42)).unwrap();
            assert!(json.contains("\"tokens\":42"));
        }

        #[test]
        fn system_constructor_tags_sender() {
            let msg = ChatMessage::system(ConversationId::new(), "Error: boom");
            assert_eq!(msg.sender, Sender::System);
        }
    }
}
