//! Error types for fetching and converting exchange rates.

use thiserror::Error;

/// Errors produced while fetching or converting rates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    /// The connection could not be established or the response could not be read.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The upstream service answered with something other than 200.
    #[error("unexpected status code: {code}")]
    UnexpectedStatus { code: u16 },

    /// The response body was not a rates document we understand.
    #[error("failed to parse rates response: {0}")]
    Parse(String),

    /// A conversion asked for a currency missing from the rate mapping.
    #[error("unsupported currency: {code}")]
    UnsupportedCurrency { code: String },

    /// Shutdown was signalled while a fetch or backoff was in progress.
    #[error("request cancelled by shutdown")]
    Cancelled,
}

/// Discriminant of [`ExchangeError`] without the attached detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    UnexpectedStatus,
    Parse,
    UnsupportedCurrency,
    Cancelled,
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::Transport(_) => ErrorKind::Transport,
            ExchangeError::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
            ExchangeError::Parse(_) => ErrorKind::Parse,
            ExchangeError::UnsupportedCurrency { .. } => ErrorKind::UnsupportedCurrency,
            ExchangeError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Message suitable for printing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            ExchangeError::Transport(_)
            | ExchangeError::UnexpectedStatus { .. }
            | ExchangeError::Parse(_) => {
                "There was an issue with the currency conversion service. Please try again later."
                    .to_string()
            }
            ExchangeError::UnsupportedCurrency { code } => {
                format!("Currency error: unsupported currency {}", code)
            }
            ExchangeError::Cancelled => "The request was cancelled.".to_string(),
        }
    }
}

/// Result type for rate operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
