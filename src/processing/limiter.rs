//! Bounded fan-out of fallible futures.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// Runs a batch of futures with at most `capacity` of them in flight.
///
/// Failures are data: every future's `Result` is returned in submission order and the batch
/// itself never fails, so one bad chunk cannot abort a document.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting `capacity` concurrent futures (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum number of futures polled concurrently.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drive every future to completion, `capacity` at a time, in FIFO admission order.
    ///
    /// The returned vector is positionally aligned with `tasks`. Errors are logged as they are
    /// caught and returned in place.
    pub async fn execute<F, T, E>(&self, tasks: impl IntoIterator<Item = F>) -> Vec<Result<T, E>>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        join_all(tasks.into_iter().map(|task| self.limit(task))).await
    }

    async fn limit<F, T, E>(&self, task: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        // The semaphore is never closed, so acquisition only fails if that invariant breaks.
        let _permit = self.semaphore.acquire().await;
        let result = task.await;
        if let Err(error) = &result {
            tracing::error!(error = %error, "Task failed");
        }
        result
    }
}
