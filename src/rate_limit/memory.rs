use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{RateLimitError, RateLimiter, WINDOW, storage_key};

/// Moving-window limiter whose state lives in this process.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InMemoryRateLimiter {
    /// Admit `limit` hits per key within any `window`.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Admit `requests_per_minute` hits per key within any sixty seconds.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, WINDOW)
    }

    fn hit(&self, key: &str, now: Instant) -> bool {
        let mut hits = self
            .hits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let window = hits.entry(storage_key(key)).or_default();
        while window
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
        {
            window.pop_front();
        }
        if window.len() < self.limit {
            window.push_back(now);
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn is_allowed(&self, key: &str) -> Result<bool, RateLimitError> {
        Ok(self.hit(key, Instant::now()))
    }
}
