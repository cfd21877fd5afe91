//! Conversation handle - shared state between the turn loop and the API.
//!
//! A [`ConversationHandle`] is the single point of coordination for one
//! conversation: the HTTP layer calls its control methods (pause,
//! resume, stop, patch) while the turn loop drives it through
//! [`next_turn`], [`record_turn`] and the terminal transitions.
//!
//! # Locking
//!
//! Status and turn bookkeeping live under a std `RwLock` that is never
//! held across an await point; the turn loop snapshots everything it
//! needs for a turn, releases the lock, and only then calls the
//! provider adapter. Lock acquisition order is always state, then
//! config, then message log.
//!
//! Control requests travel on a `tokio::sync::watch` channel so the
//! loop can wait for pause/stop changes without polling.
//!
//! [`next_turn`]: ConversationHandle::next_turn
//! [`record_turn`]: ConversationHandle::record_turn

use chrono::{DateTime, Utc};
use std::sync::RwLock;
use tokio::sync::{broadcast, watch};

use crate::domain::conversation::{
    ChatMessage, ConversationConfig, ConversationEvent, ConversationId, ConversationStatus,
    MessageLog, ParticipantConfig, ParticipantPatch, Speaker,
};
use crate::ports::{ProviderError, TurnRequest};

use super::error::OrchestratorError;

/// Capacity of the per-conversation event channel. A subscriber that
/// falls further behind than this skips ahead instead of blocking the
/// turn loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Control flags observed by the turn loop at its checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Control {
    /// Loop should idle at the next checkpoint.
    pub paused: bool,
    /// Loop should transition to Stopped at the next checkpoint.
    /// Once set this is never cleared.
    pub stop_requested: bool,
}

/// Mutable bookkeeping owned by the state lock.
#[derive(Debug)]
struct LoopState {
    status: ConversationStatus,
    turn_index: u32,
    error_detail: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

/// What the turn loop should do next.
pub(crate) enum TurnPlan {
    /// Run one provider turn.
    Run {
        speaker: Speaker,
        request: TurnRequest,
    },
    /// Message limit reached; the handle has already transitioned to
    /// Completed.
    LimitReached,
    /// A pause or stop raced in; return to the checkpoint.
    Interrupted,
}

/// Everything a newly attached subscriber needs: the messages appended
/// so far, the status at attach time, and a live receiver that is
/// guaranteed to carry exactly the events after the backfill.
pub struct Subscription {
    pub backfill: Vec<ChatMessage>,
    pub status: ConversationStatus,
    pub error_detail: Option<String>,
    pub receiver: broadcast::Receiver<ConversationEvent>,
}

/// Point-in-time view of a conversation, for detail and export
/// responses.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub id: ConversationId,
    pub status: ConversationStatus,
    pub config: ConversationConfig,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
}

/// Shared state of one conversation.
pub struct ConversationHandle {
    id: ConversationId,
    created_at: DateTime<Utc>,
    config: RwLock<ConversationConfig>,
    log: MessageLog,
    state: RwLock<LoopState>,
    events: broadcast::Sender<ConversationEvent>,
    control: watch::Sender<Control>,
}

impl ConversationHandle {
    /// Creates a handle in the Pending state.
    pub(crate) fn new(config: ConversationConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (control, _) = watch::channel(Control::default());

        Self {
            id: ConversationId::new(),
            created_at: Utc::now(),
            config: RwLock::new(config),
            log: MessageLog::new(),
            state: RwLock::new(LoopState {
                status: ConversationStatus::Pending,
                turn_index: 0,
                error_detail: None,
                finished_at: None,
            }),
            events,
            control,
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ConversationStatus {
        self.state.read().expect("state lock poisoned").status
    }

    /// Takes a consistent snapshot for detail and export responses.
    pub fn snapshot(&self) -> ConversationSnapshot {
        let state = self.state.read().expect("state lock poisoned");
        let config = self.config.read().expect("config lock poisoned");

        ConversationSnapshot {
            id: self.id,
            status: state.status,
            config: config.clone(),
            messages: self.log.all(),
            created_at: self.created_at,
            finished_at: state.finished_at,
            error_detail: state.error_detail.clone(),
        }
    }

    /// Attaches a subscriber.
    ///
    /// The backfill and the receiver are obtained under the log lock,
    /// and the status under the state lock, so a message or status
    /// change is observed exactly once: either in the returned snapshot
    /// or as a live event, never both and never neither.
    pub fn subscribe(&self) -> Subscription {
        let state = self.state.read().expect("state lock poisoned");
        let (backfill, receiver) = self.log.snapshot_with(|| self.events.subscribe());

        Subscription {
            backfill,
            status: state.status,
            error_detail: state.error_detail.clone(),
            receiver,
        }
    }

    // ----- Control surface (HTTP-facing) -----

    /// Requests a pause. The status flips immediately; a turn already
    /// in flight still completes and its message is appended.
    pub fn pause(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().expect("state lock poisoned");
        if state.status.is_terminal() {
            return Err(self.terminal_error(state.status));
        }
        state.status = state.status.transition_to(ConversationStatus::Paused)?;
        self.control.send_modify(|c| c.paused = true);
        self.publish(ConversationEvent::status(ConversationStatus::Paused));
        Ok(())
    }

    /// Resumes a paused conversation.
    pub fn resume(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().expect("state lock poisoned");
        if state.status.is_terminal() {
            return Err(self.terminal_error(state.status));
        }
        state.status = state.status.transition_to(ConversationStatus::Running)?;
        self.control.send_modify(|c| c.paused = false);
        self.publish(ConversationEvent::status(ConversationStatus::Running));
        Ok(())
    }

    /// Requests a stop.
    ///
    /// Only the flag is set here; the turn loop performs the terminal
    /// transition at its next checkpoint so that an in-flight turn can
    /// finish and be appended first.
    pub fn stop(&self) -> Result<(), OrchestratorError> {
        let state = self.state.read().expect("state lock poisoned");
        if state.status.is_terminal() {
            return Err(self.terminal_error(state.status));
        }
        self.control.send_modify(|c| c.stop_requested = true);
        Ok(())
    }

    /// Patches a participant's persona and/or temperature. Takes effect
    /// from the next turn; the turn in flight is unaffected.
    pub fn patch_participant(
        &self,
        speaker: Speaker,
        patch: &ParticipantPatch,
    ) -> Result<ParticipantConfig, OrchestratorError> {
        if patch.is_empty() {
            return Err(OrchestratorError::InvalidPatch(
                "at least one of persona or temperature must be provided".to_string(),
            ));
        }
        patch
            .validate()
            .map_err(|e| OrchestratorError::InvalidPatch(e.to_string()))?;

        let state = self.state.read().expect("state lock poisoned");
        if state.status.is_terminal() {
            return Err(self.terminal_error(state.status));
        }

        let mut config = self.config.write().expect("config lock poisoned");
        let participant = config.participant_mut(speaker);
        patch.apply(participant);
        Ok(participant.clone())
    }

    // ----- Loop surface -----

    /// Launches the lifecycle: Pending to Running.
    pub(crate) fn mark_running(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.write().expect("state lock poisoned");
        state.status = state.status.transition_to(ConversationStatus::Running)?;
        self.publish(ConversationEvent::status(ConversationStatus::Running));
        Ok(())
    }

    /// A receiver for the loop's checkpoints.
    pub(crate) fn control_receiver(&self) -> watch::Receiver<Control> {
        self.control.subscribe()
    }

    /// Decides the next step, atomically with the status checks.
    ///
    /// The limit check and the Completed transition happen under the
    /// state lock, so a pause or stop request is either observed here
    /// (yielding `Interrupted`) or arrives after the conversation is
    /// already terminal.
    pub(crate) fn next_turn(&self) -> TurnPlan {
        let mut state = self.state.write().expect("state lock poisoned");
        if self.control.borrow().stop_requested || state.status != ConversationStatus::Running {
            return TurnPlan::Interrupted;
        }

        let config = self.config.read().expect("config lock poisoned");
        if state.turn_index >= config.message_limit {
            // Running -> Completed, always valid here.
            state.status = ConversationStatus::Completed;
            state.finished_at = Some(Utc::now());
            self.publish(ConversationEvent::status(ConversationStatus::Completed));
            return TurnPlan::LimitReached;
        }

        let speaker = Speaker::for_turn(state.turn_index);
        let request = TurnRequest {
            speaker,
            history: self.log.all(),
            config: config.participant(speaker).clone(),
            initial_prompt: config.initial_prompt.clone(),
            max_tokens: config.max_tokens_per_reply,
        };
        TurnPlan::Run { speaker, request }
    }

    /// Appends a completed turn and publishes it to subscribers.
    pub(crate) fn record_turn(&self, speaker: Speaker, content: String) {
        let mut state = self.state.write().expect("state lock poisoned");
        let message = ChatMessage::new(self.id, speaker, content);
        self.log.append_with(message, |stored| {
            let _ = self.events.send(ConversationEvent::Message(stored.clone()));
        });
        state.turn_index += 1;
    }

    /// Records an unrecoverable provider failure: appends a system
    /// notice and transitions to Error.
    pub(crate) fn record_failure(&self, speaker: Speaker, error: &ProviderError) {
        let detail = format!("participant-{} provider error: {}", speaker.index(), error);

        let mut state = self.state.write().expect("state lock poisoned");
        let notice = ChatMessage::system(self.id, format!("Error: {}", detail));
        self.log.append_with(notice, |stored| {
            let _ = self.events.send(ConversationEvent::Message(stored.clone()));
        });

        if let Ok(next) = state.status.transition_to(ConversationStatus::Error) {
            state.status = next;
        }
        state.error_detail = Some(detail.clone());
        state.finished_at = Some(Utc::now());
        self.publish(ConversationEvent::error(detail));
    }

    /// Performs the Stopped transition at a loop checkpoint.
    pub(crate) fn finish_stopped(&self) {
        let mut state = self.state.write().expect("state lock poisoned");
        if state.status.is_terminal() {
            return;
        }
        if let Ok(next) = state.status.transition_to(ConversationStatus::Stopped) {
            state.status = next;
        }
        state.finished_at = Some(Utc::now());
        self.publish(ConversationEvent::status(ConversationStatus::Stopped));
    }

    /// Inter-turn delay from the current configuration.
    pub(crate) fn turn_delay(&self) -> std::time::Duration {
        self.config.read().expect("config lock poisoned").turn_delay()
    }

    /// True once terminal and finished at or before `cutoff`.
    pub(crate) fn is_sweepable(&self, cutoff: DateTime<Utc>) -> bool {
        let state = self.state.read().expect("state lock poisoned");
        state.status.is_terminal() && state.finished_at.is_some_and(|t| t <= cutoff)
    }

    fn terminal_error(&self, status: ConversationStatus) -> OrchestratorError {
        OrchestratorError::ConversationTerminal {
            id: self.id,
            status,
        }
    }

    fn publish(&self, event: ConversationEvent) {
        let _ = self.events.send(event);
    }
}
