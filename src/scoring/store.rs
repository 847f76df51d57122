//! Score persistence seam.

use async_trait::async_trait;
use dashmap::DashMap;

/// Destination for exchange scores.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Record the latest score for a user.
    async fn record(&self, user_id: &str, score: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScoreEntry {
    latest: u8,
    exchanges: u64,
}

/// Latest score per user, kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryScoreStore {
    scores: DashMap<String, ScoreEntry>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<u8> {
        self.scores.get(user_id).map(|entry| entry.latest)
    }

    /// Number of scored exchanges for a user.
    pub fn exchanges(&self, user_id: &str) -> u64 {
        self.scores.get(user_id).map_or(0, |entry| entry.exchanges)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn record(&self, user_id: &str, score: u8) {
        let mut entry = self
            .scores
            .entry(user_id.to_string())
            .or_insert(ScoreEntry { latest: score, exchanges: 0 });
        entry.latest = score;
        entry.exchanges += 1;
        tracing::debug!(user_id, score, exchanges = entry.exchanges, "Updated score");
    }
}
