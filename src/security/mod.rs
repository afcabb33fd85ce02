//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (derive key and tier, consult the counter store)
//!     → counter_store.rs / redis_store.rs (atomic GCRA step)
//!     → allowed: pass to routing, rate headers added on the way out
//!     → denied: 429 envelope with Retry-After
//! ```
//!
//! # Design Decisions
//! - Fail open: a broken counter store never blocks traffic
//! - The store is chosen at startup and shared by every request

pub mod client_ip;
pub mod counter_store;
pub mod rate_limit;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CounterStoreConfig, CounterStoreKind};

pub use counter_store::{Admission, CounterStore, Limit, MemoryCounterStore, StoreError};
pub use rate_limit::{rate_limit_middleware, LimitDecision, QuotaTier, RateLimiter};
pub use redis_store::RedisCounterStore;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the configured counter store.
///
/// The memory store gets a background task that drops refilled buckets.
pub fn counter_store_from_config(
    config: &CounterStoreConfig,
) -> Result<Arc<dyn CounterStore>, StoreError> {
    match config.kind {
        CounterStoreKind::Memory => {
            let store = Arc::new(MemoryCounterStore::new());
            let weak = Arc::downgrade(&store);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PURGE_INTERVAL);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let Some(store) = weak.upgrade() else { break };
                    let purged = store.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = store.len(), "Purged idle rate limit buckets");
                    }
                }
            });
            tracing::info!("Using in-memory rate limit store");
            Ok(store)
        }
        CounterStoreKind::Redis => {
            let store = RedisCounterStore::new(&config.redis_url, config.key_prefix.clone())?;
            tracing::info!(url = %redact(&config.redis_url), "Using redis rate limit store");
            Ok(Arc::new(store))
        }
    }
}

/// Hide credentials embedded in a connection URL.
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
