//! Build an [`Exchange`] from a configured exchange name

use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::auth::Credentials;
use super::binance::{BinanceExchange, BinanceMarket};
use super::coindcx::CoinDcxExchange;
use super::error::{ExchangeError, ExchangeResult};
use super::http::ClientConfig;
use super::okx::OkxExchange;
use super::paper::PaperExchange;
use super::Exchange;
use crate::config::ExchangeCredentials;

/// Supported adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Binance,
    BinanceUsdm,
    CoinDcx,
    Okx,
    Paper,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Binance => "binance",
            ExchangeKind::BinanceUsdm => "binanceusdm",
            ExchangeKind::CoinDcx => "coindcx",
            ExchangeKind::Okx => "okx",
            ExchangeKind::Paper => "paper",
        }
    }
}

impl FromStr for ExchangeKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeKind::Binance),
            "binanceusdm" | "binance_futures" => Ok(ExchangeKind::BinanceUsdm),
            "coindcx" => Ok(ExchangeKind::CoinDcx),
            "okx" | "okex" => Ok(ExchangeKind::Okx),
            "paper" => Ok(ExchangeKind::Paper),
            _ => Err(ExchangeError::UnsupportedExchange(s.to_string())),
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create the adapter named `name`
///
/// Unknown names fail with [`ExchangeError::UnsupportedExchange`] before any
/// network access.
pub fn create_exchange(
    name: &str,
    credentials: &ExchangeCredentials,
    config: ClientConfig,
) -> ExchangeResult<Arc<dyn Exchange>> {
    let kind: ExchangeKind = name.parse()?;
    let creds = Credentials::from(credentials);

    let exchange: Arc<dyn Exchange> = match kind {
        ExchangeKind::Binance => {
            Arc::new(BinanceExchange::new(BinanceMarket::Spot, creds, config)?)
        }
        ExchangeKind::BinanceUsdm => {
            Arc::new(BinanceExchange::new(BinanceMarket::UsdM, creds, config)?)
        }
        ExchangeKind::CoinDcx => Arc::new(CoinDcxExchange::new(creds, config)?),
        ExchangeKind::Okx => Arc::new(OkxExchange::new(creds, config)?),
        ExchangeKind::Paper => Arc::new(PaperExchange::new()),
    };

    info!("Initialized exchange: {}", kind);
    Ok(exchange)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!("binance".parse::<ExchangeKind>().unwrap(), ExchangeKind::Binance);
        assert_eq!(
            "BinanceUSDM".parse::<ExchangeKind>().unwrap(),
            ExchangeKind::BinanceUsdm
        );
        assert_eq!("okx".parse::<ExchangeKind>().unwrap(), ExchangeKind::Okx);
        assert_eq!("coindcx".parse::<ExchangeKind>().unwrap(), ExchangeKind::CoinDcx);
    }

    #[test]
    fn test_unknown_exchange_is_rejected() {
        let err = create_exchange(
            "mexc",
            &ExchangeCredentials::default(),
            ClientConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ExchangeError::UnsupportedExchange(ref name) if name == "mexc"));
        assert_eq!(err.to_string(), "exchange 'mexc' is not supported");
    }

    #[test]
    fn test_create_each_adapter() {
        let creds = ExchangeCredentials::default();
        for name in ["binance", "binanceusdm", "coindcx", "okx", "paper"] {
            let exchange = create_exchange(name, &creds, ClientConfig::default()).unwrap();
            assert_eq!(exchange.id(), name);
        }
    }
}
