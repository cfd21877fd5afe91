//! In-memory conversation registry.
//!
//! Owns every live conversation handle and the task running its turn
//! loop. All state is process-local; a restart forgets everything.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::conversation::{
    ConversationConfig, ConversationId, ParticipantPatch, Speaker,
};
use crate::ports::ParticipantFactory;

use super::engine;
use super::error::OrchestratorError;
use super::handle::ConversationHandle;

struct RegistryEntry {
    handle: Arc<ConversationHandle>,
    task: JoinHandle<()>,
}

/// Registry of all conversations in this process.
pub struct ConversationRegistry {
    conversations: RwLock<HashMap<ConversationId, RegistryEntry>>,
    factory: Arc<dyn ParticipantFactory>,
}

impl ConversationRegistry {
    /// Creates an empty registry backed by the given adapter factory.
    pub fn new(factory: Arc<dyn ParticipantFactory>) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Validates the configuration, resolves both adapters, and
    /// launches the turn loop. The returned handle is already Running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create(
        &self,
        config: ConversationConfig,
    ) -> Result<Arc<ConversationHandle>, OrchestratorError> {
        config.validate()?;
        let one = self.factory.participant_for(&config.participant_one)?;
        let two = self.factory.participant_for(&config.participant_two)?;

        let handle = Arc::new(ConversationHandle::new(config));
        handle.mark_running()?;
        let task = tokio::spawn(engine::run(handle.clone(), [one, two]));

        self.conversations
            .write()
            .expect("registry lock poisoned")
            .insert(
                handle.id(),
                RegistryEntry {
                    handle: handle.clone(),
                    task,
                },
            );

        info!(conversation = %handle.id(), "conversation started");
        Ok(handle)
    }

    /// Looks up a conversation by id.
    pub fn get(&self, id: ConversationId) -> Result<Arc<ConversationHandle>, OrchestratorError> {
        self.conversations
            .read()
            .expect("registry lock poisoned")
            .get(&id)
            .map(|entry| entry.handle.clone())
            .ok_or(OrchestratorError::NotFound(id))
    }

    pub fn pause(&self, id: ConversationId) -> Result<(), OrchestratorError> {
        self.get(id)?.pause()
    }

    pub fn resume(&self, id: ConversationId) -> Result<(), OrchestratorError> {
        self.get(id)?.resume()
    }

    pub fn stop(&self, id: ConversationId) -> Result<(), OrchestratorError> {
        self.get(id)?.stop()
    }

    pub fn patch_participant(
        &self,
        id: ConversationId,
        speaker: Speaker,
        patch: &ParticipantPatch,
    ) -> Result<crate::domain::conversation::ParticipantConfig, OrchestratorError> {
        self.get(id)?.patch_participant(speaker, patch)
    }

    /// Removes terminal conversations that finished at least `max_age`
    /// ago, returning how many were dropped.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age.as_secs() as i64);
        let mut conversations = self.conversations.write().expect("registry lock poisoned");
        let before = conversations.len();
        conversations.retain(|_, entry| !entry.handle.is_sweepable(cutoff));
        let removed = before - conversations.len();
        if removed > 0 {
            info!(removed, remaining = conversations.len(), "swept terminal conversations");
        }
        removed
    }

    /// Number of registered conversations, live and terminal.
    pub fn len(&self) -> usize {
        self.conversations
            .read()
            .expect("registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops every live conversation and waits for its loop to exit.
    pub async fn shutdown(&self) {
        let entries: Vec<RegistryEntry> = self
            .conversations
            .write()
            .expect("registry lock poisoned")
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        for entry in entries {
            let _ = entry.handle.stop();
            if let Err(join_error) = entry.task.await {
                warn!(conversation = %entry.handle.id(), error = %join_error, "turn loop did not exit cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockFactory, MockParticipant};
    use crate::domain::conversation::{
        ConversationStatus, ParticipantConfig, Provider,
    };

    fn registry() -> ConversationRegistry {
        let factory = MockFactory::new(MockParticipant::new("alpha"), MockParticipant::new("beta"));
        ConversationRegistry::new(Arc::new(factory))
    }

    fn config(message_limit: u32) -> ConversationConfig {
        ConversationConfig {
            participant_one: ParticipantConfig::new(Provider::Anthropic, "claude-3-haiku-20240307"),
            participant_two: ParticipantConfig::new(Provider::OpenAi, "gpt-4o-mini"),
            initial_prompt: "Discuss moths".to_string(),
            message_limit,
            turn_delay_ms: 0,
            max_tokens_per_reply: 500,
        }
    }

    async fn wait_terminal(handle: &ConversationHandle) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.status().is_terminal() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("conversation did not reach a terminal state");
    }

    #[tokio::test]
    async fn create_launches_a_running_conversation() {
        let registry = registry();
        let handle = registry.create(config(2)).unwrap();

        assert_eq!(registry.len(), 1);
        wait_terminal(&handle).await;
        assert_eq!(handle.status(), ConversationStatus::Completed);
        assert_eq!(handle.snapshot().messages.len(), 2);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_state_exists() {
        let registry = registry();
        let mut bad = config(2);
        bad.initial_prompt = String::new();

        assert!(matches!(
            registry.create(bad),
            Err(OrchestratorError::InvalidConfig(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let registry = registry();
        let missing = ConversationId::new();
        assert!(matches!(
            registry.get(missing),
            Err(OrchestratorError::NotFound(_))
        ));
        assert!(matches!(
            registry.pause(missing),
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn control_operations_route_to_the_handle() {
        let registry = registry();
        let mut slow = config(100);
        slow.turn_delay_ms = 60_000;
        let handle = registry.create(slow).unwrap();
        let id = handle.id();

        registry.pause(id).unwrap();
        assert_eq!(handle.status(), ConversationStatus::Paused);
        registry.resume(id).unwrap();
        assert_eq!(handle.status(), ConversationStatus::Running);

        registry.stop(id).unwrap();
        wait_terminal(&handle).await;
        assert_eq!(handle.status(), ConversationStatus::Stopped);
    }

    #[tokio::test]
    async fn second_stop_reports_terminal() {
        let registry = registry();
        let handle = registry.create(config(100)).unwrap();
        registry.stop(handle.id()).unwrap();
        wait_terminal(&handle).await;

        assert!(matches!(
            registry.stop(handle.id()),
            Err(OrchestratorError::ConversationTerminal { .. })
        ));
    }

    #[tokio::test]
    async fn sweep_drops_only_old_terminal_conversations() {
        let registry = registry();
        let finished = registry.create(config(2)).unwrap();
        wait_terminal(&finished).await;

        let mut slow = config(100);
        slow.turn_delay_ms = 60_000;
        let live = registry.create(slow).unwrap();

        // Not old enough yet.
        assert_eq!(registry.sweep(Duration::from_secs(3600)), 0);
        // Old enough; the live one stays.
        assert_eq!(registry.sweep(Duration::ZERO), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(finished.id()).is_err());
        assert!(registry.get(live.id()).is_ok());

        registry.stop(live.id()).unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let registry = registry();
        let mut slow = config(100);
        slow.turn_delay_ms = 60_000;
        let a = registry.create(slow.clone()).unwrap();
        let b = registry.create(slow).unwrap();

        tokio::time::timeout(Duration::from_secs(5), registry.shutdown())
            .await
            .unwrap();

        assert!(registry.is_empty());
        assert_eq!(a.status(), ConversationStatus::Stopped);
        assert_eq!(b.status(), ConversationStatus::Stopped);
    }
}
