//! Exchange connectivity
//!
//! The bots only talk to the [`Exchange`] trait. Each adapter owns its
//! exchange's REST endpoints, request signing and rate limiting, and maps
//! the unified `BASE/QUOTE` symbol to its native market name. REST adapters
//! load each market's tick and lot step once and align order prices and
//! quantities to them.
//!
//! # Adapters
//!
//! - [`binance`]: Binance spot (`binance`) and USD-M futures (`binanceusdm`)
//! - [`coindcx`]: CoinDCX spot
//! - [`okx`]: OKX spot (requires an API passphrase)
//! - [`paper`]: in-memory simulated account, optionally fed by a live adapter
//!
//! Use [`create_exchange`] to build an adapter from a configured name.

pub mod auth;
pub mod binance;
pub mod coindcx;
pub mod error;
pub mod factory;
pub mod http;
pub mod okx;
pub mod paper;
pub mod precision;
pub mod rate_limiter;

use async_trait::async_trait;

use crate::types::{Balance, Candle, Order, OrderRequest, Side, Ticker};

pub use auth::Credentials;
pub use binance::{BinanceExchange, BinanceMarket};
pub use coindcx::CoinDcxExchange;
pub use error::{ExchangeError, ExchangeResult};
pub use factory::{create_exchange, ExchangeKind};
pub use http::ClientConfig;
pub use okx::OkxExchange;
pub use paper::PaperExchange;
pub use precision::MarketPrecision;
pub use rate_limiter::{RateLimiter, RateLimiterConfig};

/// Operations the bots need from an exchange
///
/// Symbols are unified `BASE/QUOTE` strings.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Short adapter name, e.g. `binance`
    fn id(&self) -> &'static str;

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker>;

    async fn fetch_balance(&self) -> ExchangeResult<Balance>;

    async fn fetch_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>>;

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<Order>;

    async fn cancel_order(&self, id: &str, symbol: &str) -> ExchangeResult<()>;

    /// OHLCV candles, oldest first
    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        _timeframe: &str,
        _since: Option<i64>,
        _limit: Option<u32>,
    ) -> ExchangeResult<Vec<Candle>> {
        Err(ExchangeError::NotSupported {
            exchange: self.id(),
            operation: "fetch_ohlcv",
        })
    }

    /// Signed position amount for a derivatives symbol (negative = short)
    async fn fetch_position(&self, _symbol: &str) -> ExchangeResult<f64> {
        Err(ExchangeError::NotSupported {
            exchange: self.id(),
            operation: "fetch_position",
        })
    }

    async fn create_limit_buy_order(
        &self,
        symbol: &str,
        amount: f64,
        price: f64,
    ) -> ExchangeResult<Order> {
        self.create_order(&OrderRequest::limit(symbol, Side::Buy, amount, price))
            .await
    }

    async fn create_limit_sell_order(
        &self,
        symbol: &str,
        amount: f64,
        price: f64,
    ) -> ExchangeResult<Order> {
        self.create_order(&OrderRequest::limit(symbol, Side::Sell, amount, price))
            .await
    }
}
