//! In-memory conversation log.
//!
//! Stand-in for the external history store: keeps the most recent turns of
//! each conversation so follow-up requests carry context.

use dashmap::DashMap;
use uuid::Uuid;

use crate::conversation::{History, Role};

/// Thread-safe map of conversation ID to bounded history.
#[derive(Debug)]
pub struct ConversationLog {
    conversations: DashMap<Uuid, History>,
    limit: usize,
}

impl ConversationLog {
    pub fn new(limit: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            limit,
        }
    }

    /// Snapshot of a conversation's history (empty if unknown).
    pub fn history(&self, conversation_id: Uuid) -> History {
        self.conversations
            .get(&conversation_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| History::new(self.limit))
    }

    /// Append a completed user/agent exchange.
    pub fn record_exchange(&self, conversation_id: Uuid, message: &str, reply: &str) {
        let mut history = self
            .conversations
            .entry(conversation_id)
            .or_insert_with(|| History::new(self.limit));
        history.push(Role::User, message);
        history.push(Role::Agent, reply);
    }

    /// Number of conversations seen.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
