//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

use chat_relay::backend::prompt::Prompt;
use chat_relay::backend::{
    BackendError, BackendFactory, BackendResult, ChatBackend, CompletionRequest, ErrorKind,
};
use chat_relay::config::{AgentConfig, BreakerScope, PoolConfig, RetryConfig};
use chat_relay::workers::{WorkerBlueprint, WorkerPool};

/// What a `ScriptedBackend` does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(ErrorKind),
    Hang(Duration),
}

pub fn reply(text: &str) -> Step {
    Step::Reply(text.to_string())
}

/// In-process backend that follows a script, then repeats a fallback step.
#[derive(Debug)]
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always the same step.
    pub fn always(step: Step) -> Arc<Self> {
        Self::new(Vec::new(), step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> BackendResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        self.requests.lock().unwrap().push(request.clone());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Reply(text) => Ok(text),
            Step::Fail(kind) => Err(BackendError::new(kind, "scripted failure")),
            Step::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Err(BackendError::timeout("scripted hang ended"))
            }
        }
    }
}

/// Factory handing the same backend to every Worker and counting builds.
pub struct SharedFactory {
    backend: Arc<ScriptedBackend>,
    pub builds: AtomicUsize,
}

impl SharedFactory {
    pub fn new(backend: Arc<ScriptedBackend>) -> Arc<Self> {
        Arc::new(Self { backend, builds: AtomicUsize::new(0) })
    }
}

impl BackendFactory for SharedFactory {
    fn build(&self, _worker_id: usize) -> BackendResult<Arc<dyn ChatBackend>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.backend.clone())
    }
}

/// Retry settings with no waits between attempts.
pub fn instant_retry(tries: u32) -> RetryConfig {
    RetryConfig {
        tries,
        delay_secs: 0.0,
        max_delay_secs: 0.0,
        backoff: 1.0,
        jitter: [0.0, 0.0],
        ..RetryConfig::default()
    }
}

pub fn agent_config(retry: RetryConfig, threshold: u32, scope: BreakerScope) -> AgentConfig {
    let mut agent = AgentConfig::default();
    agent.retry = retry;
    agent.breaker.failure_threshold = threshold;
    agent.breaker.scope = scope;
    agent
}

pub fn build_pool(
    capacity: usize,
    acquire_timeout_secs: u64,
    agent: &AgentConfig,
    factory: Arc<dyn BackendFactory>,
) -> Arc<WorkerPool> {
    let config = PoolConfig { capacity, acquire_timeout_secs };
    let blueprint = WorkerBlueprint::from_config(agent, Prompt::new("You are a test persona."));
    Arc::new(WorkerPool::new(&config, blueprint, factory))
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` receives the request body and returns `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let body = read_request_body(&mut socket).await;
                        let (status, body) = f(body).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_body(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf[header_end..]).into_owned()
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// OpenAI-style completion body.
pub fn completion_json(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}
