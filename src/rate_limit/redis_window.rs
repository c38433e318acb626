use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use super::{RateLimitError, RateLimiter, WINDOW, storage_key};

// Prune, count, and admit in one atomic step. Timestamps come from the Redis clock so workers
// with skewed clocks still share one window.
const MOVING_WINDOW_SCRIPT: &str = r"
local now = redis.call('TIME')
local now_ms = tonumber(now[1]) * 1000 + math.floor(tonumber(now[2]) / 1000)
local window_ms = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', now_ms - window_ms)
if redis.call('ZCARD', KEYS[1]) < limit then
  redis.call('ZADD', KEYS[1], now_ms, ARGV[3])
  redis.call('PEXPIRE', KEYS[1], window_ms)
  return 1
end
return 0
";

/// Moving-window limiter backed by a Redis sorted set per key.
#[derive(Clone)]
pub struct RedisRateLimiter {
    connection: ConnectionManager,
    script: Script,
    limit: u32,
}

impl RedisRateLimiter {
    /// Connect to Redis and admit `requests_per_minute` hits per key and minute.
    pub async fn connect(url: &str, requests_per_minute: u32) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            script: Script::new(MOVING_WINDOW_SCRIPT),
            limit: requests_per_minute,
        })
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn is_allowed(&self, key: &str) -> Result<bool, RateLimitError> {
        let mut connection = self.connection.clone();
        let admitted: i64 = self
            .script
            .key(storage_key(key))
            .arg(WINDOW.as_millis() as u64)
            .arg(self.limit)
            .arg(Uuid::new_v4().to_string())
            .invoke_async(&mut connection)
            .await?;
        tracing::trace!(key, admitted, "Rate limit check");
        Ok(admitted == 1)
    }
}
