//! Redis-backed counter store shared by all gateway replicas.
//!
//! The GCRA step runs inside a Lua script so read, compare and write happen
//! atomically on the server. Time comes from Redis `TIME`, so replicas with
//! skewed clocks still agree.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::sync::OnceCell;

use crate::security::counter_store::{Admission, CounterStore, Limit, StoreError};

/// Microsecond GCRA. Returns {allowed, remaining, retry_after_us, reset_after_us}.
const GCRA_SCRIPT: &str = r#"
local key = KEYS[1]
local burst = tonumber(ARGV[1])
local rate = tonumber(ARGV[2])
local period = tonumber(ARGV[3])

local emission = math.max(math.floor(period / rate), 1)
local burst_offset = emission * burst

local t = redis.call("TIME")
local now = (tonumber(t[1]) - 1483228800) * 1000000 + tonumber(t[2])

local tat = tonumber(redis.call("GET", key)) or now
if tat < now then
  tat = now
end

local new_tat = tat + emission
local diff = now - (new_tat - burst_offset)
if diff < 0 then
  return {0, 0, -diff, tat - now}
end

local reset_after = new_tat - now
redis.call("SET", key, string.format("%.0f", new_tat), "PX", math.ceil(reset_after / 1000))
return {1, math.floor(diff / emission), -1, reset_after}
"#;

pub struct RedisCounterStore {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
    script: Script,
    key_prefix: String,
}

impl RedisCounterStore {
    /// Create the store. No connection is made until the first request.
    pub fn new(url: &str, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("redis client: {}", e)))?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
            script: Script::new(GCRA_SCRIPT),
            key_prefix: key_prefix.into(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.manager
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("redis connect: {}", e)))?;
                tracing::info!("Connected to redis counter store");
                Ok(manager)
            })
            .await
            .cloned()
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn allow(&self, key: &str, limit: &Limit) -> Result<Admission, StoreError> {
        let mut conn = self.connection().await?;
        let period_us = u64::try_from(limit.period.as_micros()).unwrap_or(u64::MAX);

        let reply: Vec<i64> = self
            .script
            .key(self.namespaced(key))
            .arg(limit.burst)
            .arg(limit.rate.max(1))
            .arg(period_us)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("redis eval: {}", e)))?;

        admission_from_reply(&reply)
    }
}

fn admission_from_reply(reply: &[i64]) -> Result<Admission, StoreError> {
    let [allowed, remaining, retry_us, reset_us] = reply else {
        return Err(StoreError::Protocol(format!("expected 4 integers, got {:?}", reply)));
    };

    Ok(Admission {
        allowed: *allowed == 1,
        remaining: *remaining,
        retry_after: (*retry_us >= 0).then(|| Duration::from_micros(*retry_us as u64)),
        reset_after: Duration::from_micros((*reset_us).max(0) as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_decoding() {
        let allowed = admission_from_reply(&[1, 4, -1, 100_000]).unwrap();
        assert!(allowed.allowed);
        assert_eq!(allowed.remaining, 4);
        assert_eq!(allowed.retry_after, None);
        assert_eq!(allowed.reset_after, Duration::from_millis(100));

        let denied = admission_from_reply(&[0, 0, 250_000, 2_000_000]).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_short_reply_is_protocol_error() {
        assert!(matches!(
            admission_from_reply(&[1, 2]),
            Err(StoreError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_unavailable() {
        // Nothing listens on port 1.
        let store = RedisCounterStore::new("redis://127.0.0.1:1/", "test:").unwrap();
        let err = store
            .allow("rate:ip:127.0.0.1", &Limit::per_second(1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_keys_are_prefixed() {
        let store = RedisCounterStore::new("redis://127.0.0.1:6379/", "gw:").unwrap();
        assert_eq!(store.namespaced("rate:auth:abc"), "gw:rate:auth:abc");
    }
}
