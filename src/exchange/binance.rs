//! Binance spot and USD-M futures adapter
//!
//! Signed endpoints carry `timestamp` and `recvWindow` in the query string,
//! signed with hex HMAC-SHA256 and sent with the `X-MBX-APIKEY` header.
//! Order prices and quantities are aligned to the symbol's `PRICE_FILTER`
//! tick and `LOT_SIZE` step from `exchangeInfo`, loaded once per adapter.
//!
//! # Example
//! ```no_run
//! use market_bots::exchange::{
//!     BinanceExchange, BinanceMarket, ClientConfig, Credentials, Exchange,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BinanceExchange::new(
//!         BinanceMarket::Spot,
//!         Credentials::new("api_key", "api_secret"),
//!         ClientConfig::default(),
//!     )?;
//!     let ticker = client.fetch_ticker("BTC/USDT").await?;
//!     println!("mid: {:?}", ticker.mid_price());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::auth::Credentials;
use super::error::{parse_f64, ExchangeError, ExchangeResult};
use super::http::{parse_response, push_param, ClientConfig};
use super::precision::{MarketPrecision, PrecisionCache};
use super::rate_limiter::RateLimiter;
use super::Exchange;
use crate::types::{
    Balance, Candle, Order, OrderRequest, OrderStatus, OrderType, Side, Ticker, TimeInForce,
    TradingPair,
};

/// Base URL for Binance spot API
pub const SPOT_BASE_URL: &str = "https://api.binance.com";

/// Base URL for Binance USD-M futures API
pub const FUTURES_BASE_URL: &str = "https://fapi.binance.com";

/// Maximum klines per request (Binance limit)
const MAX_KLINES_PER_REQUEST: u32 = 1000;

const RECV_WINDOW_MS: u64 = 5000;

/// Which Binance product the adapter trades
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceMarket {
    Spot,
    /// USD-M perpetual futures
    UsdM,
}

impl BinanceMarket {
    fn default_base_url(&self) -> &'static str {
        match self {
            BinanceMarket::Spot => SPOT_BASE_URL,
            BinanceMarket::UsdM => FUTURES_BASE_URL,
        }
    }

    fn path(&self, endpoint: Endpoint) -> &'static str {
        match (self, endpoint) {
            (BinanceMarket::Spot, Endpoint::BookTicker) => "/api/v3/ticker/bookTicker",
            (BinanceMarket::Spot, Endpoint::Account) => "/api/v3/account",
            (BinanceMarket::Spot, Endpoint::OpenOrders) => "/api/v3/openOrders",
            (BinanceMarket::Spot, Endpoint::Order) => "/api/v3/order",
            (BinanceMarket::Spot, Endpoint::Klines) => "/api/v3/klines",
            (BinanceMarket::Spot, Endpoint::ExchangeInfo) => "/api/v3/exchangeInfo",
            (BinanceMarket::UsdM, Endpoint::BookTicker) => "/fapi/v1/ticker/bookTicker",
            (BinanceMarket::UsdM, Endpoint::Account) => "/fapi/v2/balance",
            (BinanceMarket::UsdM, Endpoint::OpenOrders) => "/fapi/v1/openOrders",
            (BinanceMarket::UsdM, Endpoint::Order) => "/fapi/v1/order",
            (BinanceMarket::UsdM, Endpoint::Klines) => "/fapi/v1/klines",
            (BinanceMarket::UsdM, Endpoint::ExchangeInfo) => "/fapi/v1/exchangeInfo",
            (_, Endpoint::PositionRisk) => "/fapi/v2/positionRisk",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    BookTicker,
    Account,
    OpenOrders,
    Order,
    Klines,
    ExchangeInfo,
    PositionRisk,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTicker {
    bid_price: String,
    ask_price: String,
}

#[derive(Debug, Deserialize)]
struct SpotAccount {
    balances: Vec<SpotBalance>,
}

#[derive(Debug, Deserialize)]
struct SpotBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FuturesBalance {
    asset: String,
    balance: String,
    available_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrder {
    order_id: i64,
    price: String,
    orig_qty: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price { tick_size: String },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { step_size: String },
    #[serde(other)]
    Other,
}

impl SymbolInfo {
    fn precision(&self) -> ExchangeResult<MarketPrecision> {
        let mut tick_size = None;
        let mut step_size = None;
        for filter in &self.filters {
            match filter {
                SymbolFilter::Price { tick_size: tick } => tick_size = Some(tick.as_str()),
                SymbolFilter::LotSize { step_size: step } => step_size = Some(step.as_str()),
                SymbolFilter::Other => {}
            }
        }
        MarketPrecision::from_strs(
            tick_size.ok_or(ExchangeError::MissingField("PRICE_FILTER"))?,
            step_size.ok_or(ExchangeError::MissingField("LOT_SIZE"))?,
        )
    }
}

/// Convert a raw kline row `[open_time, open, high, low, close, volume, ...]`
fn kline_to_candle(raw: &[Value]) -> Option<Candle> {
    if raw.len() < 6 {
        return None;
    }

    let datetime: DateTime<Utc> = DateTime::from_timestamp_millis(raw[0].as_i64()?)?;
    Candle::new(
        datetime,
        raw[1].as_str()?.parse().ok()?,
        raw[2].as_str()?.parse().ok()?,
        raw[3].as_str()?.parse().ok()?,
        raw[4].as_str()?.parse().ok()?,
        raw[5].as_str()?.parse().ok()?,
    )
    .ok()
}

fn order_status(status: &str) -> OrderStatus {
    match status {
        "NEW" | "PARTIALLY_FILLED" => OrderStatus::Open,
        "FILLED" => OrderStatus::Closed,
        "CANCELED" | "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Canceled,
        "REJECTED" => OrderStatus::Rejected,
        _ => OrderStatus::Unknown,
    }
}

impl BinanceOrder {
    fn into_order(self, symbol: &str) -> ExchangeResult<Order> {
        let price = parse_f64("price", &self.price)?;
        let order_type = if self.order_type == "MARKET" {
            OrderType::Market
        } else {
            OrderType::Limit
        };

        Ok(Order {
            id: self.order_id.to_string(),
            symbol: symbol.to_string(),
            side: self
                .side
                .parse::<Side>()
                .map_err(|_| ExchangeError::parse("side", &self.side))?,
            order_type,
            amount: parse_f64("origQty", &self.orig_qty)?,
            price: if price > 0.0 { Some(price) } else { None },
            status: order_status(&self.status),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Binance REST adapter
#[derive(Clone)]
pub struct BinanceExchange {
    market: BinanceMarket,
    credentials: Credentials,
    http_client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    markets: PrecisionCache,
}

impl BinanceExchange {
    pub fn new(
        market: BinanceMarket,
        credentials: Credentials,
        config: ClientConfig,
    ) -> ExchangeResult<Self> {
        Ok(Self {
            market,
            credentials,
            http_client: config.build_client()?,
            rate_limiter: RateLimiter::new(config.rate_limiter.clone()),
            base_url: config.base_url_or(market.default_base_url()),
            markets: PrecisionCache::default(),
        })
    }

    pub fn market(&self) -> BinanceMarket {
        self.market
    }

    fn market_id(symbol: &str) -> ExchangeResult<String> {
        let pair: TradingPair = symbol
            .parse()
            .map_err(|_| ExchangeError::parse("symbol", symbol))?;
        Ok(pair.joined().to_uppercase())
    }

    /// Tick and lot step for a native symbol
    ///
    /// Spot asks for the one symbol; USD-M lists every contract, and all of
    /// them are cached. Symbols without both filters are skipped.
    async fn precision(&self, market_id: &str) -> ExchangeResult<MarketPrecision> {
        self.markets
            .get_or_load(market_id, || async {
                let mut query = String::new();
                if self.market == BinanceMarket::Spot {
                    push_param(&mut query, "symbol", market_id);
                }
                let info: ExchangeInfo = self.public_get(Endpoint::ExchangeInfo, &query).await?;

                let markets: Vec<(String, MarketPrecision)> = info
                    .symbols
                    .iter()
                    .filter_map(|symbol| {
                        let precision = symbol.precision().ok()?;
                        Some((symbol.symbol.clone(), precision))
                    })
                    .collect();
                debug!("Loaded filters for {} symbol(s)", markets.len());
                Ok::<_, ExchangeError>(markets)
            })
            .await
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        query: &str,
    ) -> ExchangeResult<T> {
        self.rate_limiter.acquire().await;
        let url = format!("{}{}?{}", self.base_url, self.market.path(endpoint), query);
        debug!("GET {}", url);

        let response = self.http_client.get(&url).send().await?;
        parse_response(response).await
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: Endpoint,
        mut query: String,
    ) -> ExchangeResult<T> {
        if !self.credentials.is_complete() {
            return Err(ExchangeError::MissingCredential("api_key/api_secret"));
        }

        push_param(&mut query, "recvWindow", RECV_WINDOW_MS);
        push_param(&mut query, "timestamp", Utc::now().timestamp_millis());
        let signature = self.credentials.sign(&query);
        push_param(&mut query, "signature", signature);

        self.rate_limiter.acquire().await;
        let url = format!("{}{}?{}", self.base_url, self.market.path(endpoint), query);
        debug!("{} {}{}", method, self.base_url, self.market.path(endpoint));

        let response = self
            .http_client
            .request(method, &url)
            .header("X-MBX-APIKEY", self.credentials.api_key())
            .send()
            .await?;
        parse_response(response).await
    }
}

#[async_trait]
impl Exchange for BinanceExchange {
    fn id(&self) -> &'static str {
        match self.market {
            BinanceMarket::Spot => "binance",
            BinanceMarket::UsdM => "binanceusdm",
        }
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let mut query = String::new();
        push_param(&mut query, "symbol", Self::market_id(symbol)?);
        let book: BookTicker = self.public_get(Endpoint::BookTicker, &query).await?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            bid: Some(parse_f64("bidPrice", &book.bid_price)?),
            ask: Some(parse_f64("askPrice", &book.ask_price)?),
            last: None,
        })
    }

    async fn fetch_balance(&self) -> ExchangeResult<Balance> {
        let mut balance = Balance::default();

        match self.market {
            BinanceMarket::Spot => {
                let account: SpotAccount = self
                    .signed_request(Method::GET, Endpoint::Account, String::new())
                    .await?;
                for entry in account.balances {
                    let free = parse_f64("free", &entry.free)?;
                    let locked = parse_f64("locked", &entry.locked)?;
                    if free > 0.0 || locked > 0.0 {
                        balance.insert(entry.asset, free, locked);
                    }
                }
            }
            BinanceMarket::UsdM => {
                let entries: Vec<FuturesBalance> = self
                    .signed_request(Method::GET, Endpoint::Account, String::new())
                    .await?;
                for entry in entries {
                    let total = parse_f64("balance", &entry.balance)?;
                    let free = parse_f64("availableBalance", &entry.available_balance)?;
                    if total != 0.0 || free != 0.0 {
                        balance.insert(entry.asset, free, (total - free).max(0.0));
                    }
                }
            }
        }

        Ok(balance)
    }

    async fn fetch_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        let mut query = String::new();
        push_param(&mut query, "symbol", Self::market_id(symbol)?);
        let orders: Vec<BinanceOrder> = self
            .signed_request(Method::GET, Endpoint::OpenOrders, query)
            .await?;

        orders
            .into_iter()
            .map(|order| order.into_order(symbol))
            .collect()
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<Order> {
        let market_id = Self::market_id(&request.symbol)?;
        let precision = self.precision(&market_id).await?;
        let quantity = precision.format_amount(request.amount)?;

        let mut query = String::new();
        push_param(&mut query, "symbol", &market_id);
        push_param(&mut query, "side", request.side.as_str().to_uppercase());

        match request.order_type {
            OrderType::Limit => {
                let price = request.price.ok_or(ExchangeError::MissingField("price"))?;
                let tif = request.time_in_force.unwrap_or(TimeInForce::Gtc);
                push_param(&mut query, "type", "LIMIT");
                push_param(&mut query, "timeInForce", tif.as_str());
                push_param(&mut query, "quantity", quantity);
                push_param(&mut query, "price", precision.format_price(price)?);
            }
            OrderType::Market => {
                push_param(&mut query, "type", "MARKET");
                push_param(&mut query, "quantity", quantity);
            }
        }

        let placed: BinanceOrder = self
            .signed_request(Method::POST, Endpoint::Order, query)
            .await?;
        let mut order = placed.into_order(&request.symbol)?;
        if order.price.is_none() {
            order.price = request.price;
        }
        Ok(order)
    }

    async fn cancel_order(&self, id: &str, symbol: &str) -> ExchangeResult<()> {
        let mut query = String::new();
        push_param(&mut query, "symbol", Self::market_id(symbol)?);
        push_param(&mut query, "orderId", id);
        let _: Value = self
            .signed_request(Method::DELETE, Endpoint::Order, query)
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
        let mut query = String::new();
        push_param(&mut query, "symbol", Self::market_id(symbol)?);
        push_param(&mut query, "interval", timeframe);
        if let Some(start) = since {
            push_param(&mut query, "startTime", start);
        }
        let limit = limit
            .unwrap_or(MAX_KLINES_PER_REQUEST)
            .min(MAX_KLINES_PER_REQUEST);
        push_param(&mut query, "limit", limit);

        debug!(
            "Fetching klines: symbol={}, interval={}, limit={}",
            symbol, timeframe, limit
        );

        let raw_data: Vec<Vec<Value>> = self.public_get(Endpoint::Klines, &query).await?;
        Ok(raw_data
            .iter()
            .filter_map(|row| kline_to_candle(row))
            .collect())
    }

    async fn fetch_position(&self, symbol: &str) -> ExchangeResult<f64> {
        if self.market != BinanceMarket::UsdM {
            return Err(ExchangeError::NotSupported {
                exchange: self.id(),
                operation: "fetch_position",
            });
        }

        let market_id = Self::market_id(symbol)?;
        let mut query = String::new();
        push_param(&mut query, "symbol", &market_id);

        let positions: Vec<PositionRisk> = self
            .signed_request(Method::GET, Endpoint::PositionRisk, query)
            .await?;

        for position in positions {
            if position.symbol == market_id {
                return parse_f64("positionAmt", &position.position_amt);
            }
        }
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_market_id() {
        assert_eq!(BinanceExchange::market_id("BTC/USDT").unwrap(), "BTCUSDT");
        assert_eq!(BinanceExchange::market_id("toad/usdt").unwrap(), "TOADUSDT");
        assert!(BinanceExchange::market_id("BTCUSDT").is_err());
    }

    #[test]
    fn test_kline_to_candle() {
        let row = vec![
            json!(1700000000000i64),
            json!("100.0"),
            json!("105.0"),
            json!("99.0"),
            json!("102.5"),
            json!("12.5"),
            json!(1700000899999i64),
        ];
        let candle = kline_to_candle(&row).unwrap();
        assert_eq!(candle.datetime.timestamp_millis(), 1700000000000);
        assert_eq!(candle.close, 102.5);
        assert_eq!(candle.volume, 12.5);

        assert!(kline_to_candle(&row[..3]).is_none());
    }

    #[test]
    fn test_symbol_filters() {
        let info: SymbolInfo = serde_json::from_value(json!({
            "symbol": "BTCUSDT",
            "filters": [
                {
                    "filterType": "PRICE_FILTER",
                    "minPrice": "0.01",
                    "maxPrice": "1000000",
                    "tickSize": "0.01000000"
                },
                {
                    "filterType": "LOT_SIZE",
                    "minQty": "0.00001",
                    "maxQty": "9000",
                    "stepSize": "0.00001000"
                },
                {"filterType": "NOTIONAL", "minNotional": "5.0"}
            ]
        }))
        .unwrap();
        let precision = info.precision().unwrap();
        assert_eq!(precision.format_price(64000.123).unwrap(), "64000.12");
        assert_eq!(precision.format_amount(0.0012345).unwrap(), "0.00123");

        let bare: SymbolInfo =
            serde_json::from_value(json!({"symbol": "X", "filters": []})).unwrap();
        assert!(matches!(
            bare.precision(),
            Err(ExchangeError::MissingField("PRICE_FILTER"))
        ));
    }

    #[test]
    fn test_order_status_mapping() {
        assert_eq!(order_status("NEW"), OrderStatus::Open);
        assert_eq!(order_status("PARTIALLY_FILLED"), OrderStatus::Open);
        assert_eq!(order_status("FILLED"), OrderStatus::Closed);
        assert_eq!(order_status("CANCELED"), OrderStatus::Canceled);
        assert_eq!(order_status("???"), OrderStatus::Unknown);
    }

    #[test]
    fn test_binance_order_conversion() {
        let raw: BinanceOrder = serde_json::from_value(json!({
            "orderId": 28,
            "price": "0.00000000",
            "origQty": "10.00000000",
            "side": "SELL",
            "type": "MARKET",
            "status": "FILLED"
        }))
        .unwrap();
        let order = raw.into_order("LTC/BTC").unwrap();
        assert_eq!(order.id, "28");
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.price, None);
        assert_eq!(order.status, OrderStatus::Closed);
    }

    #[test]
    fn test_adapter_ids() {
        let spot = BinanceExchange::new(
            BinanceMarket::Spot,
            Credentials::new("k", "s"),
            ClientConfig::default(),
        )
        .unwrap();
        let futures = BinanceExchange::new(
            BinanceMarket::UsdM,
            Credentials::new("k", "s"),
            ClientConfig::default(),
        )
        .unwrap();
        assert_eq!(spot.id(), "binance");
        assert_eq!(futures.id(), "binanceusdm");
    }
}
