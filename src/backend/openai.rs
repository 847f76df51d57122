//! OpenAI-compatible chat completions client.
//!
//! # Responsibilities
//! - POST `{base_url}/chat/completions` with the model and message list
//! - Extract `choices[0].message.content` from the response
//! - Classify every failure into an `ErrorKind`
//!
//! # Design Decisions
//! - One `reqwest::Client` per Worker (built by `OpenAiFactory`)
//! - Throttling (429) and 5xx are I/O faults; other 4xx are validation faults
//! - The API key is optional so local OpenAI-compatible servers work

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::backend::{
    BackendError, BackendFactory, BackendResult, ChatBackend, CompletionRequest,
};
use crate::config::BackendConfig;
use crate::conversation::Role;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Agent => "assistant",
        Role::System => "system",
    }
}

/// HTTP client for one Worker.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: &BackendConfig, api_key: Option<String>) -> BackendResult<Self> {
        let endpoint = chat_completions_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BackendError::validation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionBody<'a> {
        let mut messages = Vec::with_capacity(request.history.len() + 3);
        messages.push(ChatMessage { role: "system", content: &request.system_prompt });
        if let Some(instructions) = &request.instructions {
            messages.push(ChatMessage { role: "system", content: instructions });
        }
        for entry in &request.history {
            messages.push(ChatMessage { role: role_name(entry.role), content: &entry.text });
        }
        messages.push(ChatMessage { role: "user", content: &request.message });

        ChatCompletionBody { model: &self.model, messages }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest) -> BackendResult<String> {
        let mut builder = self.client.post(self.endpoint.clone()).json(&self.body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let bytes = response.bytes().await.map_err(classify_transport)?;
        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::type_mismatch(format!("malformed completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::type_mismatch("completion has no message content"))
    }
}

fn chat_completions_url(base_url: &str) -> BackendResult<Url> {
    let mut base = Url::parse(base_url)
        .map_err(|e| BackendError::validation(format!("invalid base URL '{base_url}': {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("chat/completions")
        .map_err(|e| BackendError::validation(format!("invalid base URL '{base_url}': {e}")))
}

fn classify_transport(err: reqwest::Error) -> BackendError {
    if err.is_connect() {
        BackendError::connection(err.to_string())
    } else if err.is_timeout() {
        BackendError::timeout(err.to_string())
    } else {
        BackendError::io(err.to_string())
    }
}

fn classify_status(status: StatusCode, detail: &str) -> BackendError {
    let message = if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", detail.chars().take(200).collect::<String>())
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BackendError::io(message)
    } else {
        BackendError::validation(message)
    }
}

/// Builds an `OpenAiBackend` per Worker.
#[derive(Debug, Clone)]
pub struct OpenAiFactory {
    config: BackendConfig,
    api_key: Option<String>,
}

impl OpenAiFactory {
    pub fn new(config: BackendConfig, api_key: Option<String>) -> Self {
        Self { config, api_key }
    }

    /// Factory reading the API key from the configured environment variable.
    pub fn from_env(config: BackendConfig) -> Self {
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!(env = %config.api_key_env, "No API key found, sending unauthenticated requests");
        }
        Self::new(config, api_key)
    }

    /// Client for the scoring pipeline, sharing the Worker settings.
    pub fn build_scorer(&self) -> BackendResult<Arc<dyn ChatBackend>> {
        self.client("scorer")
    }

    fn client(&self, owner: &str) -> BackendResult<Arc<dyn ChatBackend>> {
        let backend = OpenAiBackend::new(&self.config, self.api_key.clone())?;
        tracing::debug!(owner, endpoint = %backend.endpoint(), model = %self.config.model, "Built backend client");
        Ok(Arc::new(backend))
    }
}

impl BackendFactory for OpenAiFactory {
    fn build(&self, worker_id: usize) -> BackendResult<Arc<dyn ChatBackend>> {
        self.client(&format!("worker-{worker_id}"))
    }
}
