//! Exchange rate fetching with caching, request limiting and retries.
//!
//! A [`FetchOrchestrator`] checks the global [`RequestLimiter`], serves the
//! [`RateCache`] when the limit is reached, and otherwise asks a
//! [`RateFetcher`] for fresh rates with up to three attempts. Amounts are
//! converted with [`convert`].
//!
//! ```rust,ignore
//! let cache = Arc::new(RateCache::default());
//! let limiter = Arc::new(RequestLimiter::default());
//! let reset = spawn_reset_task(limiter.clone(), RESET_PERIOD, shutdown_rx);
//!
//! let orchestrator = FetchOrchestrator::new(Arc::new(HttpRateFetcher::new()), cache, limiter);
//! let rates = orchestrator.get_exchange_rates(&config.endpoint()).await?;
//! let eur = rates.convert(100.0, "USD", "EUR")?;
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod limiter;
pub mod models;
pub mod orchestrator;

pub use api::{HttpRateFetcher, RateFetcher};
pub use cache::{Clock, RateCache, SystemClock};
pub use config::{Config, ConfigError};
pub use convert::convert;
pub use error::{ErrorKind, ExchangeError, ExchangeResult};
pub use limiter::{spawn_reset_task, RequestLimiter};
pub use models::{RateSnapshot, RatesResponse};
pub use orchestrator::{ExchangeRates, FetchOrchestrator, RetryPolicy};
