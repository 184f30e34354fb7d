//! Process-wide request limiter with a periodic reset.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::config::RATE_LIMIT;

/// Counts accepted upstream requests within the current window.
#[derive(Debug)]
pub struct RequestLimiter {
    count: Mutex<u32>,
    limit: u32,
}

impl RequestLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            count: Mutex::new(0),
            limit,
        }
    }

    /// Returns `true` when the limit is already reached. Otherwise the request
    /// is counted and `false` is returned.
    pub fn check_and_consume(&self) -> bool {
        let mut count = self.count.lock();
        if *count >= self.limit {
            return true;
        }
        *count += 1;
        false
    }

    pub fn reset(&self) {
        *self.count.lock() = 0;
    }

    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for RequestLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT)
    }
}

/// Spawns the task that clears the limiter every `period`.
///
/// The first reset happens one full period after spawning. The task exits
/// once `shutdown` turns `true` or its sender is dropped.
pub fn spawn_reset_task(
    limiter: Arc<RequestLimiter>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut ticker = reset_ticker(Instant::now() + period, period);

    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    limiter.reset();
                    debug!("Request limiter window reset");
                }
            }
        }

        info!("Request limiter reset task stopped");
    })
}

/// A stalled runtime gets one reset, not a burst of catch-up resets.
fn reset_ticker(start: Instant, period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
