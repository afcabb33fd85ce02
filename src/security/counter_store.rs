//! Counter store contract and the in-memory implementation.
//!
//! # Responsibilities
//! - Define the narrow "increment bucket and read remaining budget" seam
//! - Implement GCRA (generic cell rate algorithm) over a concurrent map
//!
//! # Design Decisions
//! - GCRA stores one "theoretical arrival time" (TAT) per key; no timers
//! - Integer nanosecond arithmetic: burst boundaries are exact
//! - The map entry lock is held only for the in-process computation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// A rate/burst quota over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub rate: u32,
    pub burst: u32,
    pub period: Duration,
}

impl Limit {
    pub fn per_second(rate: u32, burst: u32) -> Self {
        Self {
            rate,
            burst,
            period: Duration::from_secs(1),
        }
    }

    /// Time between two evenly spaced requests, in nanoseconds (at least 1).
    fn emission_interval_ns(&self) -> i128 {
        (self.period.as_nanos() as i128 / i128::from(self.rate.max(1))).max(1)
    }
}

/// Result of one admission attempt against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Requests still admissible right now.
    pub remaining: i64,
    /// Wait before the next request can succeed (denials only).
    pub retry_after: Option<Duration>,
    /// Time until the bucket is completely refilled.
    pub reset_after: Duration,
}

/// Counter store failures. Callers treat every variant as "store unavailable".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected counter store reply: {0}")]
    Protocol(String),
}

/// Atomic "increment and read remaining budget" primitive, keyed by string.
///
/// Implementations must make the read-modify-write atomic per key so that
/// concurrent requests for one key never observe a stale budget.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn allow(&self, key: &str, limit: &Limit) -> Result<Admission, StoreError>;
}

/// One GCRA step. Times are nanoseconds on any monotonic origin.
///
/// Returns the admission and, when allowed, the TAT to store.
pub fn gcra(now: i128, tat: Option<i128>, limit: &Limit) -> (Admission, Option<i128>) {
    let emission = limit.emission_interval_ns();
    let burst_offset = emission * i128::from(limit.burst);

    let tat = tat.map_or(now, |t| t.max(now));
    let new_tat = tat + emission;
    let allow_at = new_tat - burst_offset;
    let diff = now - allow_at;

    if diff < 0 {
        let admission = Admission {
            allowed: false,
            remaining: 0,
            retry_after: Some(nanos(-diff)),
            reset_after: nanos(tat - now),
        };
        return (admission, None);
    }

    let admission = Admission {
        allowed: true,
        remaining: (diff / emission) as i64,
        retry_after: None,
        reset_after: nanos(new_tat - now),
    };
    (admission, Some(new_tat))
}

fn nanos(value: i128) -> Duration {
    Duration::from_nanos(value.clamp(0, u64::MAX as i128) as u64)
}

/// Single-process counter store.
pub struct MemoryCounterStore {
    origin: Instant,
    cells: DashMap<String, i128>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            cells: DashMap::new(),
        }
    }

    fn now(&self) -> i128 {
        self.origin.elapsed().as_nanos() as i128
    }

    /// Drop keys whose bucket has fully refilled. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        let before = self.cells.len();
        self.cells.retain(|_, tat| *tat > now);
        before.saturating_sub(self.cells.len())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn allow(&self, key: &str, limit: &Limit) -> Result<Admission, StoreError> {
        let now = self.now();
        let mut cell = self.cells.entry(key.to_string()).or_insert(now);
        let (admission, new_tat) = gcra(now, Some(*cell), limit);
        if let Some(tat) = new_tat {
            *cell = tat;
        }
        Ok(admission)
    }
}
