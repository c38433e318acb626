//! Moving-window admission control for oracle calls.
//!
//! The limiter only answers "may I call now?"; it never sleeps or queues. Callers decide how to
//! back off. Two backends share the same semantics: a Redis sorted-set window shared by every
//! worker process, and an in-process window for single-worker runs and tests.

mod memory;
mod redis_window;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryRateLimiter;
pub use redis_window::RedisRateLimiter;

/// Limiter key shared by every clause-analysis call.
pub const LLM_LIMIT_KEY: &str = "llm";

/// Width of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Errors raised by a rate-limit backend.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The shared window store could not be reached or rejected the script.
    #[error("rate limit store unavailable: {0}")]
    Store(#[from] redis::RedisError),
}

/// Admission gate counting hits per key within a sliding window.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record a hit for `key` and report whether it fits in the current window.
    ///
    /// Returns `Ok(false)` without recording anything when the window is full.
    async fn is_allowed(&self, key: &str) -> Result<bool, RateLimitError>;
}

/// Storage key used for a limiter identity.
pub(crate) fn storage_key(key: &str) -> String {
    format!("rate_limit:{key}")
}

/// Build the limiter for this process: Redis-backed when a URL is configured, in-process
/// otherwise.
pub async fn build_rate_limiter(
    redis_url: Option<&str>,
    requests_per_minute: u32,
) -> Result<Arc<dyn RateLimiter>, RateLimitError> {
    match redis_url {
        Some(url) => {
            let limiter = RedisRateLimiter::connect(url, requests_per_minute).await?;
            tracing::info!(requests_per_minute, "Using shared Redis rate limiter");
            Ok(Arc::new(limiter))
        }
        None => {
            tracing::info!(
                requests_per_minute,
                "REDIS_URL not set; rate limit applies to this process only"
            );
            Ok(Arc::new(InMemoryRateLimiter::per_minute(requests_per_minute)))
        }
    }
}
