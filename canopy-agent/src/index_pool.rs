//! Bounded background pool for reindexing.
//!
//! Jobs are fire-and-forget: no result, no retry, no cancellation. The pool
//! owns a dedicated tokio runtime so it works the same from the CLI (no
//! ambient runtime) and from inside the agent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::{Builder, Runtime};

use crate::error::{io_err, AgentError};

pub struct IndexPool {
    runtime: Option<Runtime>,
    pending: Arc<AtomicUsize>,
    workers: usize,
}

impl IndexPool {
    pub fn new(workers: usize) -> Result<Self, AgentError> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("canopy-index")
            .build()
            .map_err(|e| io_err("index-pool-runtime", e))?;
        Ok(Self {
            runtime: Some(runtime),
            pending: Arc::new(AtomicUsize::new(0)),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(runtime) = &self.runtime else { return };
        let pending = self.pending.clone();
        pending.fetch_add(1, Ordering::AcqRel);
        runtime.spawn_blocking(move || {
            let _done = PendingGuard(pending);
            job();
        });
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until no job is queued or running, or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }
}

/// Releases one pending slot when the job finishes or unwinds.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for IndexPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_jobs_and_drains() {
        let pool = IndexPool::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let done = done.clone();
            pool.submit(move || {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn panicking_job_does_not_poison_pool() {
        let pool = IndexPool::new(1).unwrap();
        pool.submit(|| panic!("indexer blew up"));
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        pool.submit(move || {
            d.fetch_add(1, Ordering::SeqCst);
        });
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(pool.pending(), 0);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
