//! Fixed-size worker pool draining a shared [`BlockingQueue`].
//!
//! The pool owns `N` OS threads, each running the same loop: block on the
//! queue, run the next task to completion, repeat. It is deliberately
//! simple: it has no notion of priorities, futures or results. The battle
//! engine layers its own cancellation (the GameOver flag) on top.
//!
//! # Shutdown
//!
//! [`WorkerPool::shutdown`] (and `Drop`) closes the queue, wakes every
//! blocked worker and joins them all. Tasks already queued still run once;
//! tasks are expected to check their own cancellation token and return
//! quickly when the work they represent is no longer wanted. No task
//! execution outlives the pool object.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use skirmish_core::pool::WorkerPool;
//!
//! let pool = WorkerPool::new(2).unwrap();
//! let counter = Arc::new(AtomicUsize::new(0));
//! for _ in 0..10 {
//!     let counter = Arc::clone(&counter);
//!     pool.submit(move || {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     })
//!     .unwrap();
//! }
//! pool.shutdown();
//! assert_eq!(counter.load(Ordering::Relaxed), 10);
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::error::{BattleError, Result};
use crate::queue::BlockingQueue;

/// A unit of deferred work executed by a pool worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// State shared between the pool, its handles and its workers.
struct PoolShared {
    queue: BlockingQueue<Task>,
    completed: AtomicU64,
}

impl PoolShared {
    fn submit(&self, task: Task) -> Result<()> {
        self.queue.push(task)
    }
}

/// Returns the pool size to use for a battle with `total_combatants`.
///
/// `min(total_combatants, available_parallelism - 1)`, never below 1. One
/// core is left for the coordinating thread.
#[must_use]
pub fn recommended_pool_size(total_combatants: usize) -> usize {
    let cores = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    total_combatants.min(cores.saturating_sub(1)).max(1)
}

// =============================================================================
// WorkerPool
// =============================================================================

/// Owns a fixed set of worker threads pulling tasks from one queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns a pool with exactly `size` worker threads.
    ///
    /// # Errors
    ///
    /// - [`BattleError::InvalidSetup`] if `size` is zero.
    /// - [`BattleError::WorkerSpawn`] if the OS refuses a thread. Workers
    ///   spawned before the failure are shut down first.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(BattleError::invalid_setup(
                "worker pool needs at least one thread",
            ));
        }

        let shared = Arc::new(PoolShared {
            queue: BlockingQueue::new(),
            completed: AtomicU64::new(0),
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(size),
        };

        for index in 0..size {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("skirmish-worker-{index}"))
                .spawn(move || worker_loop(index, &shared));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(err) => {
                    error!(index, %err, "failed to spawn worker thread");
                    pool.stop();
                    return Err(err.into());
                }
            }
        }

        debug!(size, "worker pool started");
        Ok(pool)
    }

    /// Enqueues a task for eventual execution on some worker.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::PoolShutDown`] if the pool is shutting down.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(Box::new(task))
    }

    /// Returns a cloneable handle that can submit work from any thread,
    /// including from inside a running task.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Number of tasks that have finished running (including ones that
    /// panicked).
    #[must_use]
    pub fn completed_tasks(&self) -> u64 {
        self.shared.completed.load(Ordering::Acquire)
    }

    /// Number of tasks waiting for a worker. Snapshot only.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        self.shared.queue.len()
    }

    /// Stops accepting work, drains the queue and joins every worker.
    ///
    /// Returns the total number of tasks the pool ran.
    pub fn shutdown(mut self) -> u64 {
        self.stop();
        self.completed_tasks()
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.queue.close();
        let count = self.workers.len();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
        debug!(
            workers = count,
            completed = self.completed_tasks(),
            "worker pool shut down"
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("queue", &self.shared.queue)
            .field("completed", &self.completed_tasks())
            .finish()
    }
}

/// Body of every worker thread.
fn worker_loop(index: usize, shared: &PoolShared) {
    while let Some(task) = shared.queue.pop() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!(worker = index, "task panicked; worker continues");
        }
        shared.completed.fetch_add(1, Ordering::AcqRel);
    }
    debug!(worker = index, "worker exiting");
}

// =============================================================================
// PoolHandle
// =============================================================================

/// Cloneable submitter for a [`WorkerPool`].
///
/// A handle does not keep workers alive: once the pool shuts down, `submit`
/// fails with [`BattleError::PoolShutDown`].
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<PoolShared>,
}

impl PoolHandle {
    /// Enqueues a task on the pool this handle was taken from.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::PoolShutDown`] if the pool is shutting down.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(Box::new(task))
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle").finish_non_exhaustive()
    }
}
