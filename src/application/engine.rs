//! The serialized turn loop.
//!
//! One task per conversation runs this loop: pick the speaker by turn
//! parity, call its provider adapter, append the reply, wait out the
//! configured delay, repeat. Pause and stop requests are honored at
//! checkpoints between turns; the adapter call itself is never
//! interrupted, so a turn that was in flight when a stop arrived still
//! lands in the log before the Stopped transition.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::ports::Participant;

use super::handle::{Control, ConversationHandle, TurnPlan};

/// Outcome of a checkpoint wait.
enum Checkpoint {
    Continue,
    Stop,
}

/// Drives one conversation to a terminal state.
pub(crate) async fn run(handle: Arc<ConversationHandle>, participants: [Arc<dyn Participant>; 2]) {
    let mut control = handle.control_receiver();

    loop {
        if let Checkpoint::Stop = wait_checkpoint(&mut control).await {
            handle.finish_stopped();
            break;
        }

        let (speaker, request) = match handle.next_turn() {
            TurnPlan::Run { speaker, request } => (speaker, request),
            TurnPlan::LimitReached => break,
            TurnPlan::Interrupted => continue,
        };

        debug!(
            conversation = %handle.id(),
            speaker = speaker.label(),
            history_len = request.history.len(),
            "requesting turn"
        );

        let participant = &participants[(speaker.index() - 1) as usize];
        match participant.produce(request).await {
            Ok(content) => handle.record_turn(speaker, content),
            Err(provider_error) => {
                error!(
                    conversation = %handle.id(),
                    speaker = speaker.label(),
                    error = %provider_error,
                    "provider failed, terminating conversation"
                );
                handle.record_failure(speaker, &provider_error);
                break;
            }
        }

        let delay = handle.turn_delay();
        if !delay.is_zero() {
            delay_between_turns(&mut control, delay).await;
        }
    }

    info!(
        conversation = %handle.id(),
        status = ?handle.status(),
        messages = handle.snapshot().messages.len(),
        "turn loop finished"
    );
}

/// Waits until the loop may proceed: returns `Stop` when a stop was
/// requested, `Continue` once not paused.
async fn wait_checkpoint(control: &mut watch::Receiver<Control>) -> Checkpoint {
    loop {
        let current = *control.borrow_and_update();
        if current.stop_requested {
            return Checkpoint::Stop;
        }
        if !current.paused {
            return Checkpoint::Continue;
        }
        if control.changed().await.is_err() {
            return Checkpoint::Stop;
        }
    }
}

/// Sleeps between turns, waking early when a pause or stop request
/// arrives so the next checkpoint sees it promptly.
async fn delay_between_turns(control: &mut watch::Receiver<Control>, delay: Duration) {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    tokio::select! {
        _ = &mut sleep => {}
        _ = control.wait_for(|c| c.stop_requested || c.paused) => {}
    }
}
