//! Bounded pool for transfer work.
//!
//! Work is spawned onto the tokio runtime immediately and then waits for one
//! of a fixed number of semaphore slots, so at most `slots` jobs run at once.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info_span, warn};

/// Minimum allowed pool size.
const MIN_POOL_SLOTS: usize = 1;

/// Maximum allowed pool size.
const MAX_POOL_SLOTS: usize = 100;

/// Default number of concurrently running transfer jobs.
pub const DEFAULT_POOL_SLOTS: usize = 20;

/// Error type for worker pool construction.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Invalid slot count provided.
    #[error("invalid pool size {value}: must be between {MIN_POOL_SLOTS} and {MAX_POOL_SLOTS}")]
    InvalidSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// No tokio runtime is active on the calling thread.
    #[error("worker pool requires a tokio runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Fire-and-forget executor with a fixed number of concurrent slots.
///
/// Cloning is cheap; clones share the same slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    semaphore: Arc<Semaphore>,
    slots: usize,
    handle: Handle,
}

impl WorkerPool {
    /// Creates a pool on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSize`] if `slots` is outside 1-100 and
    /// [`PoolError::NoRuntime`] when called outside a runtime.
    pub fn new(name: &str, slots: usize) -> Result<Self, PoolError> {
        Self::with_handle(name, slots, Handle::try_current()?)
    }

    /// Creates a pool that spawns onto `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSize`] if `slots` is outside 1-100.
    pub fn with_handle(name: &str, slots: usize, handle: Handle) -> Result<Self, PoolError> {
        if !(MIN_POOL_SLOTS..=MAX_POOL_SLOTS).contains(&slots) {
            return Err(PoolError::InvalidSize { value: slots });
        }
        debug!(pool = name, slots, "worker pool created");
        Ok(Self {
            name: Arc::from(name),
            semaphore: Arc::new(Semaphore::new(slots)),
            slots,
            handle,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured number of slots.
    #[must_use]
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Slots not currently held by a running job.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Runs `job` once a slot is free. Returns immediately.
    pub fn execute<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let span = info_span!("pool_job", pool = %self.name);
        self.handle.spawn(
            async move {
                // Permit released on drop
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    warn!("worker pool closed, dropping job");
                    return;
                };
                job.await;
            }
            .instrument(span),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_new_outside_runtime_fails() {
        let err = WorkerPool::new("test", 2).unwrap_err();
        assert!(matches!(err, PoolError::NoRuntime(_)));
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_sizes() {
        assert!(matches!(
            WorkerPool::new("test", 0),
            Err(PoolError::InvalidSize { value: 0 })
        ));
        assert!(matches!(
            WorkerPool::new("test", 101),
            Err(PoolError::InvalidSize { value: 101 })
        ));
        assert!(WorkerPool::new("test", 100).is_ok());
    }

    #[tokio::test]
    async fn test_execute_runs_job() {
        let pool = WorkerPool::new("test", 1).unwrap();
        let (tx, mut rx) = mpsc::channel(1);

        pool.execute(async move {
            tx.send(42).await.unwrap();
        });

        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test]
    async fn test_execute_bounds_concurrency() {
        let pool = WorkerPool::new("test", 2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel(8);

        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let tx = tx.clone();
            pool.execute(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                tx.send(()).await.unwrap();
            });
        }
        drop(tx);

        let mut finished = 0;
        while rx.recv().await.is_some() {
            finished += 1;
        }

        assert_eq!(finished, 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available_slots(), 2);
    }
}
