//! Market Bots
//!
//! Small polling bots for crypto exchanges:
//! - a limit-order market maker that keeps a symmetric ladder around mid-price,
//! - a swing trader that enters on distance from a 45-minute SMA,
//! - an order-book/balance inspector.
//!
//! Each bot is a sequential loop over an [`exchange::Exchange`]. Adapters
//! exist for Binance spot, Binance USDⓈ-M futures, CoinDCX and OKX, plus an
//! in-memory paper exchange.
//!
//! ## Ladder Example
//! ```
//! use market_bots::ladder::{build_ladder, LadderParams};
//!
//! let params = LadderParams::new(0.02, 2, 10.0).unwrap();
//! let mut ladder = build_ladder(100.0, &params);
//! let report = ladder.clamp_to_balances(100.0, 500.0);
//! assert!(report.buy_factor.is_some());
//! ```
//!
//! ## Market Maker Example (paper exchange)
//! ```no_run
//! use std::sync::Arc;
//! use market_bots::config::BotsConfig;
//! use market_bots::exchange::PaperExchange;
//! use market_bots::market_maker::{LimitOrderMarketMaker, MarketMakerParams};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BotsConfig::load_for_token("configs", "toad")?;
//!     let bot = config.resolve("toad-mm")?;
//!     let exchange = Arc::new(PaperExchange::new());
//!     let params = MarketMakerParams { base_order_amount: 10.0, ..Default::default() };
//!     let mut mm = LimitOrderMarketMaker::new(&bot, exchange, params)?;
//!     mm.run_cycle().await?;
//!     Ok(())
//! }
//! ```

pub mod candles;
pub mod config;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod ladder;
pub mod market_maker;
pub mod order_book;
pub mod orders;
pub mod prompt;
pub mod swing;
pub mod types;

pub use config::{BotConfig, BotsConfig, ExchangeCredentials, ResolvedBot};
pub use error::{ConfigError, PromptError};
pub use exchange::{Exchange, ExchangeError, ExchangeResult};
pub use types::{
    Balance, Candle, Order, OrderRequest, OrderStatus, OrderType, Side, Ticker, TimeInForce,
    TradingPair,
};
