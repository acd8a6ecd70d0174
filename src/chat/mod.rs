//! Conversational tutor: message types, bounded history and replies.
//!
//! * [`store`] keeps the last 50 messages in memory and, once the session is
//!   submitted, in storage.
//! * [`tutor`] asks the chat model for the next assistant message.

pub mod store;
pub mod tutor;

use crate::provider::MessageRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message of the tutor conversation.
///
/// `timestamp` is stored as an RFC 3339 string and read back as a
/// `DateTime<Utc>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            timestamp: Utc::now(),
            id: None,
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(MessageRole::User, message)
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, message)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether the message belongs to the user/assistant dialogue.
    pub fn is_turn(&self) -> bool {
        matches!(self.role, MessageRole::User | MessageRole::Assistant)
    }
}

/// The learner's tutor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub name: String,
    /// Kind of exercise, e.g. "grammar" or "vocabulary".
    #[serde(rename = "type")]
    pub exercise_type: String,
    pub level: String,
    pub is_submitted: bool,
    #[serde(rename = "idThreadChatBot", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self {
            name: String::new(),
            exercise_type: String::new(),
            level: "N1".to_string(),
            is_submitted: false,
            thread_id: None,
        }
    }
}
