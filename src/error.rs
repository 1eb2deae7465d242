//! Typed errors for configuration loading and interactive prompts
//!
//! Exchange-call failures live in [`crate::exchange::ExchangeError`].

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TradingPairError;

/// Failures while loading or resolving a bot configuration file
///
/// All of these are raised before any exchange client is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file '{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("token '{0}' not found in the config file")]
    UnknownToken(String),

    #[error("bot '{0}' not found in the config file")]
    UnknownBot(String),

    #[error("exchange set '{exchange_set}' referenced by bot '{bot}' is not defined")]
    UnknownExchangeSet { bot: String, exchange_set: String },

    #[error("exchange '{exchange}' is not defined in exchange set '{exchange_set}'")]
    UnknownExchange {
        exchange_set: String,
        exchange: String,
    },

    #[error(transparent)]
    InvalidTradingPair(#[from] TradingPairError),
}

/// Invalid answers to interactive prompts
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("please enter a valid integer, got '{0}'")]
    NotAnInteger(String),

    #[error("index {index} out of range (1..={max})")]
    IndexOutOfRange { index: i64, max: usize },

    #[error("please enter a valid number, got '{0}'")]
    NotANumber(String),

    #[error("the order amount must be greater than 0, got {0}")]
    NotPositive(f64),

    #[error("the number of order levels must be between 1 and {max}, got {value}")]
    LevelsOutOfRange { value: i64, max: usize },

    #[error("no input given")]
    Empty,

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}
