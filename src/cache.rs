//! In-memory rate cache with a freshness window.

use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::debug;

use crate::config::CACHE_DURATION;
use crate::models::RateSnapshot;

/// Source of wall-clock time for the cache.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

struct CachedEntry {
    snapshot: Arc<RateSnapshot>,
    fetched_at: SystemTime,
}

/// Holds the most recently stored snapshot.
pub struct RateCache {
    entry: Mutex<Option<CachedEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RateCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: Mutex::new(None),
            ttl,
            clock,
        }
    }

    /// Returns the stored snapshot while it is younger than the TTL.
    pub fn read(&self) -> Option<Arc<RateSnapshot>> {
        let entry = self.entry.lock();
        let cached = entry.as_ref()?;

        // A clock that stepped backwards reads as "just stored".
        let age = self
            .clock
            .now()
            .duration_since(cached.fetched_at)
            .unwrap_or(Duration::ZERO);

        if age < self.ttl {
            debug!(age_secs = age.as_secs(), "Cache hit");
            Some(Arc::clone(&cached.snapshot))
        } else {
            debug!(age_secs = age.as_secs(), "Cache entry stale");
            None
        }
    }

    /// Replaces the stored snapshot and restarts its freshness window.
    pub fn store(&self, snapshot: Arc<RateSnapshot>) {
        let fetched_at = self.clock.now();
        *self.entry.lock() = Some(CachedEntry {
            snapshot,
            fetched_at,
        });
        debug!("Cache updated");
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new(CACHE_DURATION)
    }
}
