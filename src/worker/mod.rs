//! External worker processes.
//!
//! A [`Worker`] owns one long-running text-generation process and the two
//! pipes attached to its stdin and stdout. Requests and replies travel as
//! one JSON object per line (see [`protocol`]).
//!
//! ```text
//!   Worker ── {"text": ..., "mood": ...}\n ──▶ stdin  ┌─────────────┐
//!                                                    │   process   │
//!   Worker ◀── {"text": ..., "mood": ...}\n ── stdout └─────────────┘
//! ```
//!
//! A worker never reports a failed exchange to its caller. Write errors,
//! read errors, end-of-file, malformed lines and the literal `error` line
//! are logged and folded into the fallback answer, which keeps the
//! caller's mood and affection unchanged.

pub mod protocol;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use crate::config::WorkerCommand;
use crate::error::{PoolError, Result};
use crate::payload::{RequestPayload, ResponsePayload};

use protocol::ExchangeFailure;

/// One external worker process plus its request/response streams.
///
/// The stream types are generic so the protocol can run over in-memory
/// pipes; a spawned worker uses the child's stdin and stdout.
pub struct Worker<W = ChildStdin, R = BufReader<ChildStdout>> {
    id: usize,
    /// Process handle. `None` for workers built from bare streams.
    child: Option<Child>,
    /// `None` once the worker has been closed.
    writer: Option<W>,
    reader: R,
    line: String,
    fallback_text: Arc<str>,
    exchanges: u64,
    last_used: Option<Instant>,
}

impl Worker {
    /// Launch the worker process with piped stdin/stdout.
    ///
    /// Stderr is inherited so the worker's own diagnostics reach the host's
    /// stderr.
    pub fn spawn(id: usize, command: &WorkerCommand, fallback_text: Arc<str>) -> Result<Self> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| PoolError::Spawn {
            program: command.program.clone(),
            reason: e.to_string(),
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(PoolError::WorkerStream { stream: "stdin" })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(PoolError::WorkerStream { stream: "stdout" })?;

        debug!(
            worker_id = id,
            pid = child.id(),
            program = %command.program,
            "worker process started"
        );

        let mut worker = Self::from_streams(id, stdin, BufReader::new(stdout), fallback_text);
        worker.child = Some(child);
        Ok(worker)
    }
}

impl<W, R> Worker<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin + Send,
{
    /// Build a worker around already-connected streams.
    pub fn from_streams(id: usize, writer: W, reader: R, fallback_text: Arc<str>) -> Self {
        Self {
            id,
            child: None,
            writer: Some(writer),
            reader,
            line: String::with_capacity(1024),
            fallback_text,
            exchanges: 0,
            last_used: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of exchanges attempted, failed ones included.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// When the last exchange started.
    pub fn last_used(&self) -> Option<Instant> {
        self.last_used
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Write one request line and read one reply line.
    ///
    /// Always returns an answer: any failure is logged and replaced with the
    /// fallback answer for `request`.
    pub async fn exchange(&mut self, request: &RequestPayload) -> ResponsePayload {
        let started = Instant::now();
        self.last_used = Some(started);
        self.exchanges += 1;

        let outcome = match self.writer.as_mut() {
            Some(writer) => {
                protocol::round_trip(writer, &mut self.reader, &mut self.line, request).await
            }
            None => Err(ExchangeFailure::Closed),
        };

        match outcome {
            Ok(response) => {
                trace!(
                    worker_id = self.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "worker exchange complete"
                );
                response
            }
            Err(failure) => {
                warn!(worker_id = self.id, error = %failure, "worker exchange failed");
                request.fallback_response(&self.fallback_text)
            }
        }
    }

    /// Close the request stream so the process sees end-of-input.
    ///
    /// Does not wait for the process to exit. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.writer.take().is_some() {
            debug!(
                worker_id = self.id,
                pid = self.child.as_ref().and_then(Child::id),
                exchanges = self.exchanges,
                "worker closed"
            );
        }
    }
}

impl<W, R> Drop for Worker<W, R> {
    fn drop(&mut self) {
        // Dropping the writer closes the pipe; the runtime reaps the child.
        self.writer.take();
    }
}
