use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::ChatArgs;
use crate::config::{self, PoolConfig};
use crate::error::Result;
use crate::pacer::{Dispatch, Pacer};
use crate::payload::{BotProfile, BotState, RequestPayload};
use crate::pool::WorkerPool;

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    /// A chat message for the bot.
    Message(String),
    /// `/resize N`
    Resize(usize),
    /// `/status`
    Status,
    /// Blank line or a malformed command.
    Ignored(Option<String>),
}

/// Classify a line of user input.
pub fn parse_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Ignored(None);
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return ChatInput::Message(trimmed.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("status"), None, None) => ChatInput::Status,
        (Some("resize"), Some(n), None) => match n.parse() {
            Ok(n) => ChatInput::Resize(n),
            Err(_) => ChatInput::Ignored(Some(format!("not a worker count: {}", n))),
        },
        _ => ChatInput::Ignored(Some(format!(
            "unknown command '/{}' (try /status or /resize N)",
            command
        ))),
    }
}

/// Chat with one bot. Mood, affection and pattern are carried from each
/// reply into the next request. Stops on end of input or Ctrl-C, closing
/// the pool and waiting for its workers. Ctrl-C also abandons a pending
/// reply, and busy workers are then only waited for up to the configured
/// shutdown grace.
pub async fn run_chat(args: ChatArgs) -> Result<()> {
    let mut config = PoolConfig::load(&config::resolve_path(args.config))?;
    if let Some(size) = args.size {
        config.size = size;
    }

    let pool = Arc::new(WorkerPool::from_config(&config));
    if pool.size() < config.size {
        eprintln!(
            "companion-pool: only {} of {} workers started (see log)",
            pool.size(),
            config.size
        );
    }

    let dispatcher: Box<dyn Dispatch> = if args.no_pacing {
        Box::new(pool.clone())
    } else {
        Box::new(Pacer::from_config(pool.clone(), &config.pacing))
    };

    let mut profile = BotProfile::default();
    if let Some(name) = args.name {
        profile.name = name;
    }
    let mut state = BotState::default();

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut interrupted = false;

    let mut lines = spawn_stdin_reader()?;
    loop {
        let line = tokio::select! {
            line = lines.recv() => line.transpose()?,
            _ = &mut interrupt => {
                interrupted = true;
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match parse_input(&line) {
            ChatInput::Message(_) if pool.size() == 0 => {
                eprintln!("companion-pool: no workers running, try /resize N");
            }
            ChatInput::Message(text) => {
                let request = RequestPayload::new(text, &profile, &state);
                let response = tokio::select! {
                    response = dispatcher.dispatch(request) => response,
                    _ = &mut interrupt => {
                        interrupted = true;
                        break;
                    }
                };
                state.apply(&response);
                println!("{}: {}", profile.name, response.text);
            }
            ChatInput::Resize(n) => {
                pool.resize(n);
                eprintln!("companion-pool: pool size {}", pool.size());
            }
            ChatInput::Status => {
                eprintln!(
                    "companion-pool: size {} live {} queued {} mood {:.2} affection {:.2}",
                    pool.size(),
                    pool.live_workers(),
                    pool.pending_tasks(),
                    state.mood,
                    state.affection
                );
            }
            ChatInput::Ignored(Some(reason)) => eprintln!("companion-pool: {}", reason),
            ChatInput::Ignored(None) => {}
        }
    }

    pool.close();
    if !interrupted {
        pool.wait().await;
        return Ok(());
    }

    info!("interrupted, waiting for busy workers");
    if tokio::time::timeout(config.shutdown_grace(), pool.wait())
        .await
        .is_err()
    {
        warn!(
            live = pool.live_workers(),
            "workers still busy after shutdown grace, exiting without them"
        );
    }
    Ok(())
}

/// Read stdin on a plain thread. A pending read on a runtime blocking
/// thread would keep the runtime from shutting down after Ctrl-C.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<std::io::Result<String>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("chat-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}
