//! Append-only message log.

use std::sync::RwLock;

use super::message::ChatMessage;

/// Ordered, append-only log of one conversation's messages.
///
/// Written only by the conversation's own turn loop; read concurrently
/// by exporters, status polling and newly attached subscribers. Readers
/// always observe a fully-formed prefix: a message becomes visible only
/// after its content is final, and there is no way to delete or mutate
/// an appended message.
#[derive(Debug, Default)]
pub struct MessageLog {
    inner: RwLock<Vec<ChatMessage>>,
}

impl MessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finalized message, returning its index.
    pub fn append(&self, message: ChatMessage) -> usize {
        self.append_with(message, |_| {})
    }

    /// Appends a message and runs `on_append` before readers can attach
    /// between the append and its side effect.
    ///
    /// The callback executes while the write lock is still held, which
    /// lets the caller publish the message to subscribers atomically
    /// with the append: a subscriber attaching via [`snapshot_with`]
    /// sees the message either in its backfill or as a live event,
    /// never both and never neither.
    ///
    /// [`snapshot_with`]: MessageLog::snapshot_with
    pub fn append_with(&self, message: ChatMessage, on_append: impl FnOnce(&ChatMessage)) -> usize {
        let mut messages = self.inner.write().expect("message log lock poisoned");
        messages.push(message);
        let index = messages.len() - 1;
        on_append(&messages[index]);
        index
    }

    /// Returns a snapshot of all messages.
    pub fn all(&self) -> Vec<ChatMessage> {
        self.inner
            .read()
            .expect("message log lock poisoned")
            .clone()
    }

    /// Returns a snapshot of messages from `index` onward.
    pub fn since(&self, index: usize) -> Vec<ChatMessage> {
        let messages = self.inner.read().expect("message log lock poisoned");
        messages.get(index..).unwrap_or_default().to_vec()
    }

    /// Takes a snapshot and runs `attach` under the same lock, so the
    /// snapshot and the attachment observe the same prefix.
    pub fn snapshot_with<R>(&self, attach: impl FnOnce() -> R) -> (Vec<ChatMessage>, R) {
        let messages = self.inner.read().expect("message log lock poisoned");
        let snapshot = messages.clone();
        let attached = attach();
        (snapshot, attached)
    }

    /// Number of messages appended so far.
    pub fn len(&self) -> usize {
        self.inner.read().expect("message log lock poisoned").len()
    }

    /// Returns true if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
