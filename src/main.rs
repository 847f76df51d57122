//! Chat relay (v1)
//!
//! Interactive front end for the relay core. Reads messages from stdin,
//! sends them through the worker pool and prints the replies.
//!
//! # Architecture Overview
//!
//! ```text
//!   stdin line
//!     → ChatService.handle
//!         → WorkerPool.acquire ──▶ Worker.invoke
//!                                    deadline ⊇ breaker ⊇ retry ⊇ OpenAiBackend
//!         ◀─ reply (or fallback) ◀── WorkerLease dropped
//!     → stdout
//!         ↳ spawned: ScoringPipeline.score → ScoreStore
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use chat_relay::backend::openai::OpenAiFactory;
use chat_relay::backend::prompt::Prompt;
use chat_relay::config::{load_config, RelayConfig};
use chat_relay::conversation::{conversation_id_for, Requester};
use chat_relay::observability::{init_logging, init_metrics};
use chat_relay::scoring::{InMemoryScoreStore, ScoringPipeline};
use chat_relay::workers::WorkerBlueprint;
use chat_relay::{lifecycle, ChatService, Shutdown, WorkerPool};

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "Resilient relay between chat users and a language-model backend", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively over stdin/stdout (default)
    Chat {
        #[arg(long, default_value = "local")]
        user_id: String,

        #[arg(long, default_value = "friend")]
        username: String,

        /// Chat key the conversation ID is derived from
        #[arg(long, default_value = "console")]
        chat: String,
    },
    /// Validate the config file and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    let command = cli.command.unwrap_or(Commands::Chat {
        user_id: "local".into(),
        username: "friend".into(),
        chat: "console".into(),
    });

    match command {
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Chat { user_id, username, chat } => {
            run_chat(config, Requester::new(user_id, username), &chat).await
        }
    }
}

async fn run_chat(
    config: RelayConfig,
    requester: Requester,
    chat: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&config.observability)?;
    tracing::info!("chat-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let factory = Arc::new(OpenAiFactory::from_env(config.backend.clone()));
    let blueprint = WorkerBlueprint::from_config(
        &config.agent,
        Prompt::new(config.backend.system_prompt.as_str()),
    );
    let scorer = if config.scoring.enabled {
        let backend = factory.build_scorer()?;
        Some(Arc::new(ScoringPipeline::from_config(&config.scoring, backend)))
    } else {
        None
    };
    let pool = Arc::new(WorkerPool::new(&config.pool, blueprint, factory));

    let mut service = ChatService::new(pool, config.agent.call_timeout())
        .with_history_limit(config.agent.history_limit);
    if let Some(scorer) = scorer {
        service = service.with_scoring(scorer, Arc::new(InMemoryScoreStore::new()));
    }

    tracing::info!(
        model = %config.backend.model,
        capacity = config.pool.capacity,
        call_timeout_secs = config.agent.call_timeout_secs,
        scoring = config.scoring.enabled,
        "Configuration loaded"
    );

    let shutdown = Arc::new(Shutdown::new());
    let mut stop = shutdown.subscribe();
    lifecycle::spawn_signal_listener(Arc::clone(&shutdown));

    let conversation_id = conversation_id_for(chat);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = stop.recv() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let reply = service.handle(message, requester.clone(), conversation_id).await;
        println!("{}", reply.text);
        if let Some(scoring) = reply.scoring {
            tokio::spawn(async move {
                if let Ok(score) = scoring.await {
                    println!("[score: {score}]");
                }
            });
        }
    }

    tracing::info!("chat-relay stopped");
    Ok(())
}
