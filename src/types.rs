//! Core data types shared by the bots and the exchange adapters
//!
//! Symbols are always carried in unified `BASE/QUOTE` form (e.g. `BTC/USDT`);
//! each exchange adapter maps them to its native market name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error, PartialEq)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// Error returned when a trading pair string cannot be parsed
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid trading pair '{0}': expected BASE/QUOTE")]
pub struct TradingPairError(pub String);

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        Ok(())
    }
}

/// Trading pair split into base and quote assets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Base asset (e.g. `TOAD` in `TOAD/USDT`)
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote asset (e.g. `USDT` in `TOAD/USDT`)
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Unified symbol, `BASE/QUOTE`
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// Market name without separator, `BASEQUOTE`
    pub fn joined(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// Market name with a custom separator, e.g. `BTC-USDT`
    pub fn joined_with(&self, separator: &str) -> String {
        format!("{}{}{}", self.base, separator, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = TradingPairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('/') =>
            {
                Ok(TradingPair::new(base, quote))
            }
            _ => Err(TradingPairError(s.to_string())),
        }
    }
}

impl TryFrom<String> for TradingPair {
    type Error = TradingPairError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.symbol()
    }
}

impl std::fmt::Display for TradingPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("unknown order side: {}", other)),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
        }
    }
}

/// Time in force for limit orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good till cancelled
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        }
    }
}

/// Order status, normalized across exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Rejected,
    Unknown,
}

/// Order record as returned by an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Exchange-assigned identifier
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: f64,
    /// None for market orders
    pub price: Option<f64>,
    pub status: OrderStatus,
}

impl Order {
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }
}

/// Request to create a new order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: f64,
    pub price: Option<f64>,
    pub time_in_force: Option<TimeInForce>,
}

impl OrderRequest {
    /// Create a limit order request
    pub fn limit(symbol: impl Into<String>, side: Side, amount: f64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            amount,
            price: Some(price),
            time_in_force: None,
        }
    }

    /// Create a market order request
    pub fn market(symbol: impl Into<String>, side: Side, amount: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            amount,
            price: None,
            time_in_force: None,
        }
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = Some(tif);
        self
    }
}

/// Best bid/ask snapshot for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
}

impl Ticker {
    /// Average of best bid and best ask
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }
}

/// Account balances keyed by currency code
///
/// `free` is what can back new orders, `used` is locked in open orders
/// and `total` is their sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub free: BTreeMap<String, f64>,
    pub used: BTreeMap<String, f64>,
    pub total: BTreeMap<String, f64>,
}

impl Balance {
    /// Record a currency's free and used amounts; total is derived
    pub fn insert(&mut self, currency: impl Into<String>, free: f64, used: f64) {
        let currency = currency.into();
        self.free.insert(currency.clone(), free);
        self.used.insert(currency.clone(), used);
        self.total.insert(currency, free + used);
    }

    /// Free amount of a currency, zero when the currency is absent
    pub fn free_of(&self, currency: &str) -> f64 {
        self.free.get(currency).copied().unwrap_or(0.0)
    }

    pub fn used_of(&self, currency: &str) -> f64 {
        self.used.get(currency).copied().unwrap_or(0.0)
    }

    pub fn total_of(&self, currency: &str) -> f64 {
        self.total.get(currency).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trading_pair_parse() {
        let pair: TradingPair = "TOAD/USDT".parse().unwrap();
        assert_eq!(pair.base(), "TOAD");
        assert_eq!(pair.quote(), "USDT");
        assert_eq!(pair.symbol(), "TOAD/USDT");
        assert_eq!(pair.joined(), "TOADUSDT");
        assert_eq!(pair.joined_with("-"), "TOAD-USDT");
    }

    #[test]
    fn test_trading_pair_rejects_malformed() {
        assert!("BTCUSDT".parse::<TradingPair>().is_err());
        assert!("/USDT".parse::<TradingPair>().is_err());
        assert!("BTC/".parse::<TradingPair>().is_err());
        assert!("A/B/C".parse::<TradingPair>().is_err());
    }

    #[test]
    fn test_trading_pair_serde_roundtrip_as_string() {
        let pair: TradingPair = serde_json::from_str("\"ETH/BTC\"").unwrap();
        assert_eq!(pair, TradingPair::new("ETH", "BTC"));
        assert_eq!(serde_json::to_string(&pair).unwrap(), "\"ETH/BTC\"");
    }

    #[test]
    fn test_ticker_mid_price() {
        let ticker = Ticker {
            symbol: "BTC/USDT".to_string(),
            bid: Some(99.0),
            ask: Some(101.0),
            last: None,
        };
        assert_eq!(ticker.mid_price(), Some(100.0));

        let one_sided = Ticker {
            ask: None,
            ..ticker
        };
        assert_eq!(one_sided.mid_price(), None);
    }

    #[test]
    fn test_balance_lookup_defaults_to_zero() {
        let mut balance = Balance::default();
        balance.insert("USDT", 500.0, 25.0);

        assert_eq!(balance.free_of("USDT"), 500.0);
        assert_eq!(balance.used_of("USDT"), 25.0);
        assert_eq!(balance.total_of("USDT"), 525.0);
        assert_eq!(balance.free_of("BTC"), 0.0);
    }

    #[test]
    fn test_side_parse_and_display() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(Side::Sell.to_string(), "sell");
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn test_candle_validation() {
        let now = Utc::now();
        assert!(Candle::new(now, 100.0, 105.0, 95.0, 102.0, 10.0).is_ok());
        assert_eq!(
            Candle::new(now, 100.0, 90.0, 95.0, 92.0, 10.0),
            Err(CandleValidationError::HighLessThanLow {
                high: 90.0,
                low: 95.0
            })
        );
        assert!(matches!(
            Candle::new(now, 100.0, 105.0, 95.0, 102.0, -1.0),
            Err(CandleValidationError::NegativeVolume(_))
        ));
    }
}
