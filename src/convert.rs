use std::collections::HashMap;

use crate::error::{ExchangeError, ExchangeResult};

/// Converts `amount` from one currency to another using rates that share a base.
///
/// The `from` side is checked first, so a request where both codes are
/// unknown reports `from`.
pub fn convert(
    amount: f64,
    from: &str,
    to: &str,
    rates: &HashMap<String, f64>,
) -> ExchangeResult<f64> {
    let from_rate = rates
        .get(from)
        .ok_or_else(|| ExchangeError::UnsupportedCurrency {
            code: from.to_string(),
        })?;
    let to_rate = rates
        .get(to)
        .ok_or_else(|| ExchangeError::UnsupportedCurrency {
            code: to.to_string(),
        })?;

    Ok(amount * (to_rate / from_rate))
}
