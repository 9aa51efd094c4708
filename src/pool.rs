//! The fixed set of worker threads shared by every phase of a run.

use std::panic::{self, AssertUnwindSafe};

use rayon::{Scope, ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, WordCountError};

/// `workers` long-lived threads, built once and reused for the map and reduce
/// phases of every batch and for the final sorts.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("wc-worker-{}", i))
            .build()
            .map_err(WordCountError::ThreadPool)?;
        Ok(WorkerPool { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `op` on the pool and returns once it and every task it spawned
    /// have finished. A panicking task fails the call with `WorkerPanic(phase)`.
    pub fn scope<'scope, OP, R>(&self, phase: &'static str, op: OP) -> Result<R>
    where
        OP: FnOnce(&Scope<'scope>) -> R + Send,
        R: Send,
    {
        panic::catch_unwind(AssertUnwindSafe(|| self.pool.scope(op)))
            .map_err(|_| WordCountError::WorkerPanic(phase))
    }

    /// Runs `op` on one of the pool threads, so `rayon::join` inside it forks
    /// onto this pool.
    pub fn install<OP, R>(&self, phase: &'static str, op: OP) -> Result<R>
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        panic::catch_unwind(AssertUnwindSafe(|| self.pool.install(op)))
            .map_err(|_| WordCountError::WorkerPanic(phase))
    }
}
