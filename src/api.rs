//! Upstream rates fetcher over HTTP.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{ExchangeError, ExchangeResult};
use crate::models::{RateSnapshot, RatesResponse};

/// One round trip to an upstream rates service.
///
/// Implementations make exactly one attempt; retrying is the caller's job.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch(&self, endpoint: &str) -> ExchangeResult<RateSnapshot>;
}

/// Fetches rates over HTTP with a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpRateFetcher {
    client: Client,
}

impl HttpRateFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RateFetcher for HttpRateFetcher {
    async fn fetch(&self, endpoint: &str) -> ExchangeResult<RateSnapshot> {
        // The endpoint carries the API key, so errors drop the URL.
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: RatesResponse = response.json().await.map_err(|e| {
                    let e = e.without_url();
                    if e.is_decode() {
                        ExchangeError::Parse(e.to_string())
                    } else {
                        ExchangeError::Transport(e.to_string())
                    }
                })?;
                let snapshot = body.into_snapshot()?;
                debug!(
                    base = snapshot.base_code(),
                    currencies = snapshot.rates().len(),
                    "Fetched exchange rates"
                );
                Ok(snapshot)
            }
            status @ (StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS) => {
                warn!(
                    code = status.as_u16(),
                    "Upstream refused request, quota likely exhausted"
                );
                Err(ExchangeError::UnexpectedStatus {
                    code: status.as_u16(),
                })
            }
            status => Err(ExchangeError::UnexpectedStatus {
                code: status.as_u16(),
            }),
        }
    }
}
