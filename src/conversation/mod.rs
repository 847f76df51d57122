//! Conversation data handed to the call pipeline.
//!
//! # Responsibilities
//! - Describe who is asking (`Requester`) and in which conversation
//! - Carry a bounded, oldest-first message history (`history.rs`)
//! - Keep recent turns per conversation in memory (`log.rs`)

pub mod history;
pub mod log;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use history::History;
pub use log::ConversationLog;

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }
}

/// Identity of the user behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requester {
    pub user_id: String,
    pub username: String,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), username: username.into() }
    }
}

/// A single chat request entering the pipeline.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub message: String,
    pub requester: Requester,
    pub conversation_id: Uuid,
    pub history: History,
}

impl CallRequest {
    /// Create a request with an empty history.
    pub fn new(message: impl Into<String>, requester: Requester, conversation_id: Uuid) -> Self {
        Self {
            message: message.into(),
            requester,
            conversation_id,
            history: History::default(),
        }
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }
}

/// Stable conversation ID derived from a transport-level chat key.
pub fn conversation_id_for(chat_key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chat_key.as_bytes())
}
