//! Chat service: the boundary between a message transport and the core.
//!
//! # Responsibilities
//! - Attach stored history to each incoming message
//! - Run acquire → invoke → release for the request
//! - Collapse every failure to the generic fallback reply
//! - Record the exchange and score it off the response path

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::conversation::{CallRequest, ConversationLog, History, Requester};
use crate::error::RelayResult;
use crate::scoring::{InMemoryScoreStore, ScoreStore, ScoringPipeline};
use crate::workers::WorkerPool;

/// Result of handling one message.
#[derive(Debug)]
pub struct Reply {
    /// Text to send back to the user.
    pub text: String,
    /// `false` when `text` is the fallback reply.
    pub delivered: bool,
    /// Background scoring task, if scoring ran.
    pub scoring: Option<JoinHandle<u8>>,
}

pub struct ChatService {
    pool: Arc<WorkerPool>,
    call_timeout: Duration,
    conversations: Arc<ConversationLog>,
    scorer: Option<Arc<ScoringPipeline>>,
    scores: Arc<dyn ScoreStore>,
}

impl ChatService {
    pub fn new(pool: Arc<WorkerPool>, call_timeout: Duration) -> Self {
        Self {
            pool,
            call_timeout,
            conversations: Arc::new(ConversationLog::new(History::DEFAULT_LIMIT)),
            scorer: None,
            scores: Arc::new(InMemoryScoreStore::new()),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.conversations = Arc::new(ConversationLog::new(limit));
        self
    }

    pub fn with_scoring(mut self, scorer: Arc<ScoringPipeline>, scores: Arc<dyn ScoreStore>) -> Self {
        self.scorer = Some(scorer);
        self.scores = scores;
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn conversations(&self) -> &Arc<ConversationLog> {
        &self.conversations
    }

    /// Run one request through the pool. The Worker is released on every
    /// exit path when the lease drops.
    pub async fn respond(&self, request: &CallRequest) -> RelayResult<String> {
        let worker = self.pool.acquire().await?;
        worker.invoke(request, self.call_timeout).await
    }

    /// Handle one inbound message end to end.
    ///
    /// Never fails: errors become the fallback reply. Scoring runs in a
    /// spawned task after the reply is ready.
    pub async fn handle(&self, message: &str, requester: Requester, conversation_id: Uuid) -> Reply {
        let history = self.conversations.history(conversation_id);
        let request = CallRequest::new(message, requester, conversation_id).with_history(history);

        match self.respond(&request).await {
            Ok(text) => {
                self.conversations
                    .record_exchange(conversation_id, &request.message, &text);
                let scoring = self.spawn_scoring(&request, &text);
                Reply { text, delivered: true, scoring }
            }
            Err(err) => {
                tracing::debug!(
                    user_id = %request.requester.user_id,
                    conversation_id = %conversation_id,
                    kind = err.label(),
                    "Sending fallback reply"
                );
                Reply {
                    text: err.user_message().to_string(),
                    delivered: false,
                    scoring: None,
                }
            }
        }
    }

    fn spawn_scoring(&self, request: &CallRequest, reply: &str) -> Option<JoinHandle<u8>> {
        let scorer = Arc::clone(self.scorer.as_ref()?);
        let scores = Arc::clone(&self.scores);
        let user_id = request.requester.user_id.clone();
        let message = request.message.clone();
        let reply = reply.to_string();

        Some(tokio::spawn(async move {
            let score = scorer.score(&message, &reply).await;
            scores.record(&user_id, score).await;
            tracing::info!(user_id = %user_id, score, "Exchange scored");
            score
        }))
    }
}
