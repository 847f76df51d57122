//! Prompt assembly.
//!
//! Turns a `CallRequest` into the `CompletionRequest` a backend understands:
//! the shared system prompt, per-request instructions naming the user and the
//! current UTC time, and the bounded history.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::CompletionRequest;
use crate::conversation::{CallRequest, Requester};

/// System prompt shared by every request a pipeline sends.
#[derive(Debug, Clone)]
pub struct Prompt {
    system_prompt: Arc<str>,
}

impl Prompt {
    pub fn new(system_prompt: impl Into<Arc<str>>) -> Self {
        Self { system_prompt: system_prompt.into() }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Per-request instructions for `requester` at `now`.
    pub fn instructions_for(&self, requester: &Requester, now: DateTime<Utc>) -> String {
        format!(
            "The user's name is {}.\nCurrent date and time is {} (UTC).",
            requester.username,
            now.format("%Y-%m-%d %H:%M:%S"),
        )
    }

    /// Assemble the completion request for a chat call.
    pub fn build(&self, request: &CallRequest) -> CompletionRequest {
        self.build_at(request, Utc::now())
    }

    pub(crate) fn build_at(&self, request: &CallRequest, now: DateTime<Utc>) -> CompletionRequest {
        CompletionRequest {
            system_prompt: Arc::clone(&self.system_prompt),
            instructions: Some(self.instructions_for(&request.requester, now)),
            history: request.history.to_vec(),
            message: request.message.clone(),
        }
    }
}
