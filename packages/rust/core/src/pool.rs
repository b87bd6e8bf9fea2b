//! Bounded worker pool for CPU-bound fan-out.
//!
//! Every scoring and extraction job goes through one semaphore, so a single
//! engine never runs more than [`WorkerPool::size`] jobs at once however many
//! requests are in flight. Jobs run on tokio's blocking threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use graphctx_shared::{CORE_MULTIPLIER, GraphContextError, MAX_WORKERS, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
    dispatched: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Pool with `size` concurrent jobs (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            dispatched: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `min(32, logical cores × 2)`.
    pub fn default_size() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cores * CORE_MULTIPLIER).min(MAX_WORKERS)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs handed to the pool since construction.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Jobs that actually ran. Lags [`dispatched`](Self::dispatched) when
    /// queued jobs were aborted before starting.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Queue `job` into `tasks`. It starts once a permit is free.
    ///
    /// Aborting the task before it holds a permit drops the job unrun. Once
    /// started, a job keeps its permit until it returns, even if its task
    /// was aborted.
    pub fn spawn<F, R>(&self, tasks: &mut JoinSet<Result<R>>, job: F)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let semaphore = Arc::clone(&self.semaphore);
        let completed = Arc::clone(&self.completed);
        tasks.spawn(async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| GraphContextError::Worker(e.to_string()))?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let output = job();
                completed.fetch_add(1, Ordering::Relaxed);
                output
            })
            .await
            .map_err(|e| GraphContextError::Worker(format!("worker task failed: {e}")))
        });
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}

/// Flatten a joined pool task into the job's output.
pub(crate) fn joined<R>(
    result: std::result::Result<Result<R>, tokio::task::JoinError>,
) -> Result<R> {
    result.map_err(|e| GraphContextError::Worker(format!("worker task lost: {e}")))?
}
