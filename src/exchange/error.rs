//! Errors raised by exchange adapters

use thiserror::Error;

/// Result alias for exchange calls
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Failure of a single exchange call
///
/// Callers inside the bot loops log these and skip the operation.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse {field}: '{value}'")]
    Parse { field: &'static str, value: String },

    #[error("missing field '{0}' in response")]
    MissingField(&'static str),

    #[error("exchange '{0}' is not supported")]
    UnsupportedExchange(String),

    #[error("{operation} is not supported by {exchange}")]
    NotSupported {
        exchange: &'static str,
        operation: &'static str,
    },

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("insufficient {currency}: required {required}, available {available}")]
    InsufficientFunds {
        currency: String,
        required: f64,
        available: f64,
    },

    #[error("no market data for {0}")]
    NoMarketData(String),

    #[error("market {0} is not listed")]
    UnknownMarket(String),

    #[error("amount {amount} is below the lot step {step}")]
    BelowLotStep { amount: f64, step: String },
}

impl ExchangeError {
    pub(crate) fn parse(field: &'static str, value: impl Into<String>) -> Self {
        ExchangeError::Parse {
            field,
            value: value.into(),
        }
    }
}

/// Parse a decimal that exchanges send as a JSON string
pub(crate) fn parse_f64(field: &'static str, value: &str) -> ExchangeResult<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| ExchangeError::parse(field, value))
}
