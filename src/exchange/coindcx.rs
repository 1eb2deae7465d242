//! CoinDCX spot adapter
//!
//! Authenticated endpoints are POSTs whose JSON body carries a millisecond
//! `timestamp`; the body is signed with hex HMAC-SHA256 and sent in the
//! `X-AUTH-SIGNATURE` header next to `X-AUTH-APIKEY`.
//!
//! Markets are named `BASEQUOTE` (e.g. `BTCINR`); candle pairs use the
//! `I-BTC_INR` / `B-BTC_USDT` form. Order prices and quantities are rounded
//! to the precisions listed by `markets_details`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::auth::Credentials;
use super::error::{ExchangeError, ExchangeResult};
use super::http::{parse_response, ClientConfig};
use super::precision::{to_f64, MarketPrecision, PrecisionCache};
use super::rate_limiter::RateLimiter;
use super::Exchange;
use crate::types::{
    Balance, Candle, Order, OrderRequest, OrderStatus, OrderType, Side, Ticker, TradingPair,
};

/// Base URL for CoinDCX API
pub const API_BASE_URL: &str = "https://api.coindcx.com";

/// Base URL for public market data endpoints
pub const PUBLIC_BASE_URL: &str = "https://public.coindcx.com";

// ==================== WIRE TYPES ====================

#[derive(Debug, Deserialize)]
struct DcxTicker {
    market: String,
    #[serde(default, deserialize_with = "deserialize_opt_f64")]
    bid: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_opt_f64")]
    ask: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_opt_f64")]
    last_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DcxBalance {
    currency: String,
    #[serde(deserialize_with = "deserialize_f64_or_string")]
    balance: f64,
    #[serde(deserialize_with = "deserialize_f64_or_string")]
    locked_balance: f64,
}

#[derive(Debug, Deserialize)]
struct DcxOrder {
    id: String,
    status: String,
    #[serde(default)]
    market: Option<String>,
    #[serde(default)]
    order_type: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    total_quantity: Option<f64>,
    #[serde(default)]
    price_per_unit: Option<f64>,
}

/// Entry of `markets_details`; the target currency is the traded asset
#[derive(Debug, Deserialize)]
struct DcxMarketDetails {
    coindcx_name: String,
    base_currency_precision: u32,
    target_currency_precision: u32,
    #[serde(default, deserialize_with = "deserialize_opt_f64")]
    step: Option<f64>,
}

impl DcxMarketDetails {
    fn precision(&self) -> MarketPrecision {
        let by_decimals = MarketPrecision::from_decimals(
            self.base_currency_precision,
            self.target_currency_precision,
        );
        match self.step.and_then(Decimal::from_f64) {
            Some(step) if step > Decimal::ZERO => {
                MarketPrecision::new(by_decimals.tick_size(), step.normalize())
            }
            _ => by_decimals,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DcxOrders {
    orders: Vec<DcxOrder>,
}

#[derive(Debug, Deserialize)]
struct DcxCandle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    /// Candle open time in milliseconds
    time: i64,
}

#[derive(Debug, Clone, Serialize)]
struct TimestampRequest {
    timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
struct ActiveOrdersRequest {
    market: String,
    timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
struct CancelOrderRequest {
    id: String,
    timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
struct CreateOrderRequest {
    side: String,
    order_type: String,
    market: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    price_per_unit: Option<f64>,
    total_quantity: f64,
    timestamp: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn order_status(status: &str) -> OrderStatus {
    match status {
        "init" | "open" | "partially_filled" => OrderStatus::Open,
        "filled" => OrderStatus::Closed,
        "cancelled" | "partially_cancelled" => OrderStatus::Canceled,
        "rejected" => OrderStatus::Rejected,
        _ => OrderStatus::Unknown,
    }
}

impl DcxOrder {
    fn into_order(self, symbol: &str) -> ExchangeResult<Order> {
        let side = self
            .side
            .as_deref()
            .ok_or(ExchangeError::MissingField("side"))?;

        debug!("Order {} on {:?}", self.id, self.market);

        Ok(Order {
            side: side
                .parse::<Side>()
                .map_err(|_| ExchangeError::parse("side", side))?,
            order_type: match self.order_type.as_deref() {
                Some("market_order") => OrderType::Market,
                _ => OrderType::Limit,
            },
            amount: self.total_quantity.unwrap_or(0.0),
            price: self.price_per_unit.filter(|p| *p > 0.0),
            status: order_status(&self.status),
            symbol: symbol.to_string(),
            id: self.id,
        })
    }
}

// ==================== CLIENT ====================

/// CoinDCX REST adapter
#[derive(Clone)]
pub struct CoinDcxExchange {
    credentials: Credentials,
    http_client: Client,
    rate_limiter: RateLimiter,
    api_base_url: String,
    public_base_url: String,
    markets: PrecisionCache,
}

impl CoinDcxExchange {
    pub fn new(credentials: Credentials, config: ClientConfig) -> ExchangeResult<Self> {
        Ok(Self {
            credentials,
            http_client: config.build_client()?,
            rate_limiter: RateLimiter::new(config.rate_limiter.clone()),
            api_base_url: config.base_url_or(API_BASE_URL),
            public_base_url: config.base_url_or(PUBLIC_BASE_URL),
            markets: PrecisionCache::default(),
        })
    }

    fn pair(symbol: &str) -> ExchangeResult<TradingPair> {
        symbol
            .parse()
            .map_err(|_| ExchangeError::parse("symbol", symbol))
    }

    /// `BTC/INR` -> `BTCINR`
    fn market_id(symbol: &str) -> ExchangeResult<String> {
        Ok(Self::pair(symbol)?.joined().to_uppercase())
    }

    /// `BTC/INR` -> `I-BTC_INR`, `BTC/USDT` -> `B-BTC_USDT`
    fn candle_pair(symbol: &str) -> ExchangeResult<String> {
        let pair = Self::pair(symbol)?;
        let prefix = if pair.quote().eq_ignore_ascii_case("INR") {
            "I"
        } else {
            "B"
        };
        Ok(format!("{}-{}", prefix, pair.joined_with("_").to_uppercase()))
    }

    /// Every market is listed in one response; all of them are cached
    async fn precision(&self, market_id: &str) -> ExchangeResult<MarketPrecision> {
        self.markets
            .get_or_load(market_id, || async {
                let url = format!("{}/exchange/v1/markets_details", self.api_base_url);
                let details: Vec<DcxMarketDetails> = self.public_get(&url).await?;
                Ok::<_, ExchangeError>(
                    details
                        .into_iter()
                        .map(|market| {
                            let precision = market.precision();
                            (market.coindcx_name, precision)
                        })
                        .collect(),
                )
            })
            .await
    }

    async fn public_get<T: DeserializeOwned>(&self, url: &str) -> ExchangeResult<T> {
        self.rate_limiter.acquire().await;
        debug!("GET {}", url);
        let response = self.http_client.get(url).send().await?;
        parse_response(response).await
    }

    /// Make an authenticated POST request
    async fn authenticated_post<T, R>(&self, endpoint: &str, body: &T) -> ExchangeResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        if !self.credentials.is_complete() {
            return Err(ExchangeError::MissingCredential("api_key/api_secret"));
        }

        let url = format!("{}{}", self.api_base_url, endpoint);
        let json_body = serde_json::to_string(body)?;
        let signature = self.credentials.sign(&json_body);

        self.rate_limiter.acquire().await;
        debug!("POST {}", endpoint);

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-AUTH-APIKEY", self.credentials.api_key())
            .header("X-AUTH-SIGNATURE", signature)
            .body(json_body)
            .send()
            .await?;
        parse_response(response).await
    }
}

#[async_trait]
impl Exchange for CoinDcxExchange {
    fn id(&self) -> &'static str {
        "coindcx"
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let market = Self::market_id(symbol)?;
        let url = format!("{}/exchange/ticker", self.api_base_url);
        let tickers: Vec<DcxTicker> = self.public_get(&url).await?;

        let ticker = tickers
            .into_iter()
            .find(|t| t.market == market)
            .ok_or_else(|| ExchangeError::NoMarketData(symbol.to_string()))?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            bid: ticker.bid,
            ask: ticker.ask,
            last: ticker.last_price,
        })
    }

    async fn fetch_balance(&self) -> ExchangeResult<Balance> {
        let request = TimestampRequest { timestamp: now_ms() };
        let entries: Vec<DcxBalance> = self
            .authenticated_post("/exchange/v1/users/balances", &request)
            .await?;

        let mut balance = Balance::default();
        for entry in entries {
            if entry.balance != 0.0 || entry.locked_balance != 0.0 {
                balance.insert(entry.currency, entry.balance, entry.locked_balance);
            }
        }
        Ok(balance)
    }

    async fn fetch_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        let request = ActiveOrdersRequest {
            market: Self::market_id(symbol)?,
            timestamp: now_ms(),
        };
        let response: DcxOrders = self
            .authenticated_post("/exchange/v1/orders/active_orders", &request)
            .await?;

        response
            .orders
            .into_iter()
            .map(|order| order.into_order(symbol))
            .collect()
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<Order> {
        let order_type = match request.order_type {
            OrderType::Limit => "limit_order",
            OrderType::Market => "market_order",
        };
        if request.order_type == OrderType::Limit && request.price.is_none() {
            return Err(ExchangeError::MissingField("price"));
        }

        let market = Self::market_id(&request.symbol)?;
        let precision = self.precision(&market).await?;
        let price_per_unit = match request.price {
            Some(price) => Some(to_f64(precision.align_price(price)?)?),
            None => None,
        };

        let body = CreateOrderRequest {
            side: request.side.to_string(),
            order_type: order_type.to_string(),
            market,
            price_per_unit,
            total_quantity: to_f64(precision.align_amount(request.amount)?)?,
            timestamp: now_ms(),
        };

        let response: DcxOrders = self
            .authenticated_post("/exchange/v1/orders/create", &body)
            .await?;

        let placed = response
            .orders
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::Rejected("empty order list in response".to_string()))?;
        placed.into_order(&request.symbol)
    }

    async fn cancel_order(&self, id: &str, _symbol: &str) -> ExchangeResult<()> {
        let request = CancelOrderRequest {
            id: id.to_string(),
            timestamp: now_ms(),
        };
        let _: Value = self
            .authenticated_post("/exchange/v1/orders/cancel", &request)
            .await?;
        Ok(())
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: Option<u32>,
    ) -> ExchangeResult<Vec<Candle>> {
        let mut url = format!(
            "{}/market_data/candles?pair={}&interval={}",
            self.public_base_url,
            Self::candle_pair(symbol)?,
            timeframe
        );
        if let Some(start) = since {
            url.push_str(&format!("&startTime={}", start));
        }
        if let Some(l) = limit {
            url.push_str(&format!("&limit={}", l));
        }

        let raw: Vec<DcxCandle> = self.public_get(&url).await?;

        // Newest first on the wire
        let mut candles: Vec<Candle> = raw
            .into_iter()
            .filter_map(|c| {
                let datetime: DateTime<Utc> = DateTime::from_timestamp_millis(c.time)?;
                Candle::new(datetime, c.open, c.high, c.low, c.close, c.volume).ok()
            })
            .collect();
        candles.sort_by_key(|c| c.datetime);
        Ok(candles)
    }
}

// Custom deserializer for f64 that can handle string representation
fn deserialize_f64_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct F64OrString;

    impl<'de> Visitor<'de> for F64OrString {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number or a string representing a number")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.trim().parse().map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_any(F64OrString)
}

fn deserialize_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_market_naming() {
        assert_eq!(CoinDcxExchange::market_id("BTC/INR").unwrap(), "BTCINR");
        assert_eq!(
            CoinDcxExchange::candle_pair("BTC/INR").unwrap(),
            "I-BTC_INR"
        );
        assert_eq!(
            CoinDcxExchange::candle_pair("ETH/USDT").unwrap(),
            "B-ETH_USDT"
        );
    }

    #[test]
    fn test_ticker_accepts_strings_and_numbers() {
        let ticker: DcxTicker = serde_json::from_value(json!({
            "market": "BTCINR",
            "bid": "5000000.5",
            "ask": 5000100,
            "last_price": null
        }))
        .unwrap();
        assert_eq!(ticker.bid, Some(5000000.5));
        assert_eq!(ticker.ask, Some(5000100.0));
        assert_eq!(ticker.last_price, None);
    }

    #[test]
    fn test_balance_parsing() {
        let balance: DcxBalance = serde_json::from_value(json!({
            "currency": "INR",
            "balance": "1500.25",
            "locked_balance": 100
        }))
        .unwrap();
        assert_eq!(balance.balance, 1500.25);
        assert_eq!(balance.locked_balance, 100.0);
    }

    #[test]
    fn test_order_conversion() {
        let raw: DcxOrder = serde_json::from_value(json!({
            "id": "ead19992-43fd-11e8-b027-bb815bcb14ed",
            "status": "open",
            "market": "BTCINR",
            "order_type": "limit_order",
            "side": "buy",
            "total_quantity": 0.5,
            "price_per_unit": 5000000.0
        }))
        .unwrap();
        let order = raw.into_order("BTC/INR").unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.price, Some(5000000.0));
        assert_eq!(order.symbol, "BTC/INR");
    }

    #[test]
    fn test_order_status_mapping() {
        assert_eq!(order_status("partially_filled"), OrderStatus::Open);
        assert_eq!(order_status("filled"), OrderStatus::Closed);
        assert_eq!(order_status("cancelled"), OrderStatus::Canceled);
    }

    #[test]
    fn test_market_details_precision() {
        let details: DcxMarketDetails = serde_json::from_value(json!({
            "coindcx_name": "BTCINR",
            "base_currency_precision": 2,
            "target_currency_precision": 5,
            "step": 0.0001
        }))
        .unwrap();
        let precision = details.precision();
        assert_eq!(precision.format_price(5000000.456).unwrap(), "5000000.46");
        assert_eq!(precision.format_amount(0.123456).unwrap(), "0.1234");

        let without_step: DcxMarketDetails = serde_json::from_value(json!({
            "coindcx_name": "ETHUSDT",
            "base_currency_precision": 2,
            "target_currency_precision": 3
        }))
        .unwrap();
        assert_eq!(
            without_step.precision().format_amount(1.23456).unwrap(),
            "1.234"
        );
    }

    #[test]
    fn test_api_urls() {
        assert_eq!(API_BASE_URL, "https://api.coindcx.com");
        assert_eq!(PUBLIC_BASE_URL, "https://public.coindcx.com");
    }
}
