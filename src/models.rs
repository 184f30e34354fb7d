use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::convert::convert;
use crate::error::{ExchangeError, ExchangeResult};

/// One immutable set of rates relative to `base_code`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSnapshot {
    base_code: String,
    rates: HashMap<String, f64>,
}

impl RateSnapshot {
    /// Builds a snapshot, rejecting any rate that is not strictly positive and finite.
    pub fn new(base_code: impl Into<String>, rates: HashMap<String, f64>) -> ExchangeResult<Self> {
        if let Some((code, rate)) = rates
            .iter()
            .find(|(_, rate)| !(rate.is_finite() && **rate > 0.0))
        {
            return Err(ExchangeError::Parse(format!(
                "invalid rate {} for {}",
                rate, code
            )));
        }

        Ok(Self {
            base_code: base_code.into(),
            rates,
        })
    }

    pub fn base_code(&self) -> &str {
        &self.base_code
    }

    pub fn rates(&self) -> &HashMap<String, f64> {
        &self.rates
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> ExchangeResult<f64> {
        convert(amount, from, to, &self.rates)
    }
}

/// Body of a successful upstream response.
///
/// `base_code`/`conversion_rates` is the canonical shape. Older deployments of
/// the service answer with `base`/`rates` (plus a `date`), which is normalized
/// into the same snapshot.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RatesResponse {
    Canonical {
        base_code: String,
        conversion_rates: HashMap<String, f64>,
    },
    Legacy {
        base: String,
        rates: HashMap<String, f64>,
        #[serde(default)]
        #[allow(dead_code)]
        date: Option<String>,
    },
}

impl RatesResponse {
    pub fn into_snapshot(self) -> ExchangeResult<RateSnapshot> {
        match self {
            RatesResponse::Canonical {
                base_code,
                conversion_rates,
            } => RateSnapshot::new(base_code, conversion_rates),
            RatesResponse::Legacy { base, rates, .. } => RateSnapshot::new(base, rates),
        }
    }
}
