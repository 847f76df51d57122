//! Bounded message history.

use std::collections::VecDeque;

use crate::conversation::{HistoryEntry, Role};

/// Oldest-first history that evicts the oldest entry once `limit` is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    /// Default number of turns kept per conversation.
    pub const DEFAULT_LIMIT: usize = 15;

    /// Create an empty history. A limit of 0 keeps nothing.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    /// Build from existing entries, keeping only the newest `limit`.
    pub fn from_entries<I>(limit: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = HistoryEntry>,
    {
        let mut history = Self::new(limit);
        for entry in entries {
            history.push_entry(entry);
        }
        history
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.push_entry(HistoryEntry::new(role, text));
    }

    pub fn push_entry(&mut self, entry: HistoryEntry) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}
