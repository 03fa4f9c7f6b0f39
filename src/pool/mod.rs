//! Resizable pool of worker processes fed from one shared task queue.
//!
//! ```text
//!   dispatch ──▶ ┌──────────────┐ ──▶ worker loop 1 ──▶ process 1
//!   dispatch ──▶ │ task queue   │ ──▶ worker loop 2 ──▶ process 2
//!   dispatch ──▶ │ (bounded)    │ ──▶ worker loop N ──▶ process N
//!                └──────────────┘          ▲
//!   resize ── kill signals ────────────────┘
//! ```
//!
//! Every worker loop races the next task against a kill signal. Shrinking
//! posts one kill signal per removed worker and whichever idle loop takes
//! it exits; which one is not specified. A loop in the middle of an
//! exchange finishes it before looking at either channel again.

pub mod task;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::{PoolConfig, WorkerCommand};
use crate::pacer::Dispatch;
use crate::payload::{RequestPayload, ResponsePayload};
use crate::worker::Worker;

pub use task::Task;

/// Pending task buffer used by [`WorkerPool::create`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
/// Reply text of the fallback answer used by [`WorkerPool::create`].
pub const DEFAULT_FALLBACK_TEXT: &str = "Ok";

/// State shared between the pool handle and its worker loops.
struct Shared {
    queue: tokio::sync::Mutex<mpsc::Receiver<Task>>,
    kill: tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>,
    /// Number of worker loops that have started and not yet exited.
    live: watch::Sender<usize>,
}

/// A size-adjustable set of workers consuming one shared task queue.
///
/// Must be created and resized inside a tokio runtime.
pub struct WorkerPool {
    shared: Arc<Shared>,
    /// `None` after [`close`](Self::close).
    tasks: Mutex<Option<mpsc::Sender<Task>>>,
    kill: mpsc::UnboundedSender<()>,
    /// Logical size; the resize lock.
    size: Mutex<usize>,
    command: WorkerCommand,
    fallback_text: Arc<str>,
    next_id: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool with the default queue capacity and fallback text, then
    /// grow it to `initial_size` workers.
    pub fn create(command: WorkerCommand, initial_size: usize) -> Self {
        Self::build(
            command,
            DEFAULT_QUEUE_CAPACITY,
            Arc::from(DEFAULT_FALLBACK_TEXT),
            initial_size,
        )
    }

    /// Create a pool from a loaded configuration.
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::build(
            config.worker.clone(),
            config.queue_capacity,
            Arc::from(config.fallback_text.as_str()),
            config.size,
        )
    }

    fn build(
        command: WorkerCommand,
        queue_capacity: usize,
        fallback_text: Arc<str>,
        initial_size: usize,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::channel(queue_capacity.max(1));
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let (live, _) = watch::channel(0);

        let pool = Self {
            shared: Arc::new(Shared {
                queue: tokio::sync::Mutex::new(task_rx),
                kill: tokio::sync::Mutex::new(kill_rx),
                live,
            }),
            tasks: Mutex::new(Some(task_tx)),
            kill: kill_tx,
            size: Mutex::new(0),
            command,
            fallback_text,
            next_id: AtomicUsize::new(1),
        };
        pool.resize(initial_size);
        pool
    }

    /// Hand a request to the next free worker and wait for its reply.
    ///
    /// Blocks while the queue is full. Never fails: if the pool is closed
    /// or the reply channel is dropped, the fallback answer for the
    /// request's mood and affection is returned.
    pub async fn dispatch(&self, request: RequestPayload) -> ResponsePayload {
        let fallback = request.fallback_response(&self.fallback_text);

        let sender = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(sender) = sender else {
            warn!("dispatch on closed worker pool");
            return fallback;
        };

        let (task, reply) = Task::new(request);
        if sender.send(task).await.is_err() {
            warn!("task queue closed during dispatch");
            return fallback;
        }
        drop(sender);

        match reply.await {
            Ok(response) => response,
            Err(_) => {
                warn!("task dropped without a reply");
                fallback
            }
        }
    }

    /// Grow or shrink the pool to `n` workers.
    ///
    /// Growth spawns the processes immediately; a spawn failure is logged
    /// and stops growth, leaving the pool smaller than requested until the
    /// next resize. Shrinking posts kill signals and returns without
    /// waiting for workers to exit; busy workers finish their current
    /// exchange first.
    pub fn resize(&self, n: usize) {
        let mut size = self.size.lock().unwrap_or_else(|e| e.into_inner());
        let from = *size;

        while *size < n {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let worker = match Worker::spawn(id, &self.command, self.fallback_text.clone()) {
                Ok(worker) => worker,
                Err(e) => {
                    error!(
                        worker_id = id,
                        program = %self.command.program,
                        error = %e,
                        "failed to start worker"
                    );
                    break;
                }
            };
            *size += 1;
            self.shared.live.send_modify(|live| *live += 1);
            tokio::spawn(run_worker(self.shared.clone(), worker));
        }

        while *size > n {
            *size -= 1;
            // The receiver lives in `shared`, which this pool keeps alive.
            let _ = self.kill.send(());
        }

        if from != *size {
            info!(from, to = *size, requested = n, "worker pool resized");
        }
    }

    /// Stop accepting tasks. Workers finish everything already queued and
    /// then exit.
    pub fn close(&self) {
        let sender = self.tasks.lock().unwrap_or_else(|e| e.into_inner()).take();
        if sender.is_some() {
            info!("worker pool closed");
        }
    }

    /// Wait until every worker loop has exited.
    ///
    /// Call [`close`](Self::close) first, otherwise this waits for the pool
    /// to be resized to zero.
    pub async fn wait(&self) {
        let mut live = self.shared.live.subscribe();
        // The sender lives in `shared`; it cannot be dropped while we hold it.
        let _ = live.wait_for(|n| *n == 0).await;
    }

    /// Target number of workers after the last resize.
    pub fn size(&self) -> usize {
        *self.size.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Worker loops currently running. Lags [`size`](Self::size) while
    /// killed workers finish their current exchange.
    pub fn live_workers(&self) -> usize {
        *self.shared.live.borrow()
    }

    /// Tasks waiting in the queue, 0 once closed.
    pub fn pending_tasks(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

#[async_trait]
impl Dispatch for WorkerPool {
    async fn dispatch(&self, request: RequestPayload) -> ResponsePayload {
        WorkerPool::dispatch(self, request).await
    }
}

/// Decrements the live count when a worker loop ends, however it ends.
struct LiveGuard(Arc<Shared>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.send_modify(|live| *live = live.saturating_sub(1));
    }
}

async fn run_worker(shared: Arc<Shared>, mut worker: Worker) {
    let _guard = LiveGuard(shared.clone());
    let id = worker.id();
    debug!(worker_id = id, "worker loop started");

    loop {
        tokio::select! {
            task = next_task(&shared) => match task {
                Some(task) => {
                    let response = worker.exchange(task.request()).await;
                    if !task.complete(response) {
                        debug!(worker_id = id, "caller gone before reply");
                    }
                }
                None => {
                    debug!(worker_id = id, "task queue closed, worker exiting");
                    break;
                }
            },
            _ = next_kill(&shared) => {
                debug!(worker_id = id, "kill signal received, worker exiting");
                break;
            }
        }
    }

    worker.close();
}

async fn next_task(shared: &Shared) -> Option<Task> {
    shared.queue.lock().await.recv().await
}

async fn next_kill(shared: &Shared) -> Option<()> {
    shared.kill.lock().await.recv().await
}
