//! Rate-aware fetching: limiter check, cache fallback, bounded retries.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::RateFetcher;
use crate::cache::RateCache;
use crate::config::{FETCH_TIMEOUT, MAX_ATTEMPTS};
use crate::error::{ExchangeError, ExchangeResult};
use crate::limiter::RequestLimiter;
use crate::models::RateSnapshot;

/// How many times to try the upstream and how long a single try may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fetch_timeout: Duration,
}

impl RetryPolicy {
    /// Delay after a failed attempt: `attempt²` seconds.
    pub fn backoff(attempt: u32) -> Duration {
        Duration::from_secs(u64::from(attempt) * u64::from(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }
}

/// Result of one "get current rates" call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRates {
    /// `None` only when the limiter forced a fallback and the cache had nothing fresh.
    pub snapshot: Option<Arc<RateSnapshot>>,
    /// Served from the cache because the request limit was reached.
    pub from_cache: bool,
}

impl ExchangeRates {
    /// The fetched mapping, or an empty one after a cold fallback.
    pub fn rates(&self) -> &HashMap<String, f64> {
        static NO_RATES: OnceLock<HashMap<String, f64>> = OnceLock::new();
        match &self.snapshot {
            Some(snapshot) => snapshot.rates(),
            None => NO_RATES.get_or_init(HashMap::new),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rates().is_empty()
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> ExchangeResult<f64> {
        crate::convert::convert(amount, from, to, self.rates())
    }
}

pub struct FetchOrchestrator {
    fetcher: Arc<dyn RateFetcher>,
    cache: Arc<RateCache>,
    limiter: Arc<RequestLimiter>,
    policy: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl FetchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn RateFetcher>,
        cache: Arc<RateCache>,
        limiter: Arc<RequestLimiter>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            limiter,
            policy: RetryPolicy::default(),
            shutdown: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Abort in-flight fetches and backoff sleeps once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Returns current rates, from upstream when the limiter allows it and
    /// from the cache otherwise.
    ///
    /// Only the last attempt's error is returned. Hitting the request limit is
    /// not an error, even when the cache has nothing fresh to offer.
    #[instrument(skip_all)]
    pub async fn get_exchange_rates(&self, endpoint: &str) -> ExchangeResult<ExchangeRates> {
        let mut shutdown = self.shutdown.clone();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if is_shutdown(&shutdown) {
                return Err(ExchangeError::Cancelled);
            }

            if self.limiter.check_and_consume() {
                let snapshot = self.cache.read();
                warn!(
                    attempt,
                    cached = snapshot.is_some(),
                    "Rate limit exceeded, using cached rates"
                );
                return Ok(ExchangeRates {
                    snapshot,
                    from_cache: true,
                });
            }

            debug!(attempt, "Fetching exchange rates");
            match self.fetch_once(endpoint, &mut shutdown).await {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    self.cache.store(Arc::clone(&snapshot));
                    info!(attempt, base = snapshot.base_code(), "Exchange rates updated");
                    return Ok(ExchangeRates {
                        snapshot: Some(snapshot),
                        from_cache: false,
                    });
                }
                Err(ExchangeError::Cancelled) => return Err(ExchangeError::Cancelled),
                Err(e) if attempt + 1 >= max_attempts => {
                    warn!(attempt, error = %e, "Giving up on exchange rates");
                    return Err(e);
                }
                Err(e) => {
                    let delay = RetryPolicy::backoff(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_secs = delay.as_secs(),
                        "Fetch failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => return Err(ExchangeError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            attempt += 1;
        }
    }

    async fn fetch_once(
        &self,
        endpoint: &str,
        shutdown: &mut Option<watch::Receiver<bool>>,
    ) -> ExchangeResult<RateSnapshot> {
        let timeout = self.policy.fetch_timeout;
        tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown) => Err(ExchangeError::Cancelled),
            result = tokio::time::timeout(timeout, self.fetcher.fetch(endpoint)) => {
                result.unwrap_or_else(|_| {
                    Err(ExchangeError::Transport(format!(
                        "request timed out after {}s",
                        timeout.as_secs()
                    )))
                })
            }
        }
    }
}

fn is_shutdown(shutdown: &Option<watch::Receiver<bool>>) -> bool {
    shutdown.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once shutdown is signalled; never resolves without a receiver or
/// after its sender is gone.
async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    std::future::pending::<()>().await
}
