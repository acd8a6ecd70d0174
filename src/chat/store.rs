//! Bounded message history for the tutor conversation.
//!
//! [`MessageRing`] is the in-memory bound: a `VecDeque` that evicts from the
//! front once full, so appending stays O(1) amortized no matter how long the
//! conversation runs. [`MessageStore`] adds persistence on top of it through
//! [`SafeStorage`], under two keys:
//!
//! | key                   | value                                 |
//! |-----------------------|---------------------------------------|
//! | `chatBotMessagesAnki` | JSON array of the last 50 messages    |
//! | `formData`            | the [`ChatSession`]                   |
//!
//! Messages are only written once the session is submitted; before that the
//! store is memory-only. The bound is applied on every write and on load, so
//! a storage entry written by an older, unbounded version is truncated the
//! first time it is read.

use crate::chat::{ChatMessage, ChatSession};
use crate::config::GenerationConfig;
use crate::storage::SafeStorage;
use std::collections::VecDeque;
use tracing::debug;

/// Storage key of the message history.
pub const MESSAGES_KEY: &str = "chatBotMessagesAnki";
/// Storage key of the session settings.
pub const SESSION_KEY: &str = "formData";
/// Default history bound.
pub const MAX_MESSAGES: usize = 50;

/// Greeting shown when there is no stored history.
pub const WELCOME_MESSAGE: &str = "Hello, how can I help you?";

/// Fixed-capacity FIFO of chat messages.
#[derive(Debug, Clone)]
pub struct MessageRing {
    buf: VecDeque<ChatMessage>,
    capacity: usize,
}

impl MessageRing {
    /// A ring holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, message: ChatMessage) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        for m in messages {
            self.append(m);
        }
    }

    /// Replace the contents with the last `capacity` of `messages`.
    pub fn replace_all(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.buf.clear();
        self.extend(messages);
    }

    /// Oldest first.
    pub fn to_ordered_list(&self) -> Vec<ChatMessage> {
        self.buf.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.buf.back()
    }
}

/// Tutor history and session, persisted through [`SafeStorage`].
pub struct MessageStore {
    ring: MessageRing,
    session: ChatSession,
    storage: SafeStorage,
}

impl MessageStore {
    /// Load history and session from `storage`.
    ///
    /// Missing or corrupt entries fall back to a single welcome message and
    /// a default session.
    pub fn load(storage: SafeStorage, capacity: usize) -> Self {
        let saved: Vec<ChatMessage> = storage.get_item(MESSAGES_KEY, default_messages());
        let session: ChatSession = storage.get_item(SESSION_KEY, ChatSession::default());

        let mut ring = MessageRing::new(capacity);
        let total = saved.len();
        ring.replace_all(saved);
        if total > ring.len() {
            debug!("Loaded {total} stored messages, kept the last {}", ring.len());
        }

        Self {
            ring,
            session,
            storage,
        }
    }

    /// Load with the bound taken from `config.message_capacity`.
    pub fn from_config(storage: SafeStorage, config: &GenerationConfig) -> Self {
        Self::load(storage, config.message_capacity)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.ring.to_ordered_list()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn append(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.ring.extend(messages);
        self.persist_messages();
    }

    pub fn replace_all(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.ring.replace_all(messages);
        self.persist_messages();
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Replace the session settings and store them.
    pub fn update_session(&mut self, session: ChatSession) {
        self.session = session;
        self.storage.set_item(SESSION_KEY, &self.session);
    }

    /// Mark the session submitted and flush the history.
    pub fn submit(&mut self, mut session: ChatSession) {
        session.is_submitted = true;
        self.update_session(session);
        self.persist_messages();
    }

    fn persist_messages(&self) {
        if self.session.is_submitted {
            self.storage.set_item(MESSAGES_KEY, &self.ring.to_ordered_list());
        }
    }
}

fn default_messages() -> Vec<ChatMessage> {
    vec![ChatMessage::assistant(WELCOME_MESSAGE).with_id("welcome")]
}
