//! OKX spot adapter (API v5)
//!
//! Requests are signed over `timestamp + method + path + body` with base64
//! HMAC-SHA256 and carry the `OK-ACCESS-*` headers, including the account
//! passphrase. Order sizes and prices follow the instrument's `lotSz` and
//! `tickSz`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::auth::{sign_base64, Credentials};
use super::error::{parse_f64, ExchangeError, ExchangeResult};
use super::http::{parse_response, ClientConfig};
use super::precision::{to_f64, MarketPrecision, PrecisionCache};
use super::rate_limiter::RateLimiter;
use super::Exchange;
use crate::types::{
    Balance, Candle, Order, OrderRequest, OrderStatus, OrderType, Side, Ticker, TradingPair,
};

/// Base URL for OKX API
pub const API_BASE_URL: &str = "https://www.okx.com";

/// OKX wraps every payload as `{"code": "0", "msg": "", "data": [...]}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxTicker {
    #[serde(default)]
    bid_px: String,
    #[serde(default)]
    ask_px: String,
    #[serde(default)]
    last: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    tick_sz: String,
    lot_sz: String,
}

#[derive(Debug, Deserialize)]
struct OkxAccount {
    #[serde(default)]
    details: Vec<OkxBalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxBalanceDetail {
    ccy: String,
    #[serde(default)]
    avail_bal: String,
    #[serde(default)]
    frozen_bal: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxOrder {
    ord_id: String,
    side: String,
    ord_type: String,
    sz: String,
    #[serde(default)]
    px: String,
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxOrderAck {
    ord_id: String,
    #[serde(default)]
    s_code: String,
    #[serde(default)]
    s_msg: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderBody {
    inst_id: String,
    td_mode: &'static str,
    side: &'static str,
    ord_type: &'static str,
    sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    px: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tgt_ccy: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelOrderBody {
    inst_id: String,
    ord_id: String,
}

fn parse_optional(field: &'static str, value: &str) -> ExchangeResult<Option<f64>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse_f64(field, value).map(Some)
    }
}

fn order_status(state: &str) -> OrderStatus {
    match state {
        "live" | "partially_filled" => OrderStatus::Open,
        "filled" => OrderStatus::Closed,
        "canceled" | "mmp_canceled" => OrderStatus::Canceled,
        _ => OrderStatus::Unknown,
    }
}

/// Map an OKX bar size to the unified timeframe (`1h` -> `1H`, minutes unchanged)
fn bar_for_timeframe(timeframe: &str) -> String {
    match timeframe.chars().last() {
        Some('h') | Some('d') | Some('w') => timeframe.to_uppercase(),
        _ => timeframe.to_string(),
    }
}

impl OkxOrder {
    fn into_order(self, symbol: &str) -> ExchangeResult<Order> {
        Ok(Order {
            side: self
                .side
                .parse::<Side>()
                .map_err(|_| ExchangeError::parse("side", &self.side))?,
            order_type: if self.ord_type == "market" {
                OrderType::Market
            } else {
                OrderType::Limit
            },
            amount: parse_f64("sz", &self.sz)?,
            price: parse_optional("px", &self.px)?,
            status: order_status(&self.state),
            symbol: symbol.to_string(),
            id: self.ord_id,
        })
    }
}

/// OKX REST adapter
#[derive(Clone)]
pub struct OkxExchange {
    credentials: Credentials,
    http_client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    instruments: PrecisionCache,
}

impl OkxExchange {
    pub fn new(credentials: Credentials, config: ClientConfig) -> ExchangeResult<Self> {
        Ok(Self {
            credentials,
            http_client: config.build_client()?,
            rate_limiter: RateLimiter::new(config.rate_limiter.clone()),
            base_url: config.base_url_or(API_BASE_URL),
            instruments: PrecisionCache::default(),
        })
    }

    /// `BTC/USDT` -> `BTC-USDT`
    fn inst_id(symbol: &str) -> ExchangeResult<String> {
        let pair: TradingPair = symbol
            .parse()
            .map_err(|_| ExchangeError::parse("symbol", symbol))?;
        Ok(pair.joined_with("-").to_uppercase())
    }

    async fn precision(&self, inst_id: &str) -> ExchangeResult<MarketPrecision> {
        self.instruments
            .get_or_load(inst_id, || async {
                let path = format!(
                    "/api/v5/public/instruments?instType=SPOT&instId={}",
                    inst_id
                );
                let instruments: Vec<OkxInstrument> = self.public_get(&path).await?;
                instruments
                    .into_iter()
                    .map(|instrument| {
                        let precision =
                            MarketPrecision::from_strs(&instrument.tick_sz, &instrument.lot_sz)?;
                        Ok((instrument.inst_id, precision))
                    })
                    .collect::<ExchangeResult<Vec<_>>>()
            })
            .await
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> ExchangeResult<Vec<T>> {
        if envelope.code != "0" {
            return Err(ExchangeError::Rejected(format!(
                "code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        Ok(envelope.data)
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> ExchangeResult<Vec<T>> {
        self.rate_limiter.acquire().await;
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {}", url);

        let response = self.http_client.get(&url).send().await?;
        let envelope: Envelope<T> = parse_response(response).await?;
        Self::unwrap_envelope(envelope)
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<String>,
    ) -> ExchangeResult<Vec<T>> {
        if !self.credentials.is_complete() {
            return Err(ExchangeError::MissingCredential("api_key/api_secret"));
        }
        let passphrase = self
            .credentials
            .passphrase()
            .ok_or(ExchangeError::MissingCredential("api_password"))?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let body = body.unwrap_or_default();
        let prehash = format!("{}{}{}{}", timestamp, method.as_str(), path_and_query, body);
        let signature = sign_base64(&prehash, self.credentials.api_secret());

        self.rate_limiter.acquire().await;
        debug!("{} {}", method, path_and_query);

        let mut request = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path_and_query))
            .header("OK-ACCESS-KEY", self.credentials.api_key())
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", passphrase)
            .header("Content-Type", "application/json");
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let envelope: Envelope<T> = parse_response(response).await?;
        Self::unwrap_envelope(envelope)
    }
}

#[async_trait]
impl Exchange for OkxExchange {
    fn id(&self) -> &'static str {
        "okx"
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let path = format!("/api/v5/market/ticker?instId={}", Self::inst_id(symbol)?);
        let tickers: Vec<OkxTicker> = self.public_get(&path).await?;
        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::NoMarketData(symbol.to_string()))?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            bid: parse_optional("bidPx", &ticker.bid_px)?,
            ask: parse_optional("askPx", &ticker.ask_px)?,
            last: parse_optional("last", &ticker.last)?,
        })
    }

    async fn fetch_balance(&self) -> ExchangeResult<Balance> {
        let accounts: Vec<OkxAccount> = self
            .signed_request(Method::GET, "/api/v5/account/balance", None)
            .await?;

        let mut balance = Balance::default();
        for detail in accounts.into_iter().flat_map(|a| a.details) {
            let free = parse_optional("availBal", &detail.avail_bal)?.unwrap_or(0.0);
            let used = parse_optional("frozenBal", &detail.frozen_bal)?.unwrap_or(0.0);
            balance.insert(detail.ccy, free, used);
        }
        Ok(balance)
    }

    async fn fetch_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        let path = format!(
            "/api/v5/trade/orders-pending?instType=SPOT&instId={}",
            Self::inst_id(symbol)?
        );
        let orders: Vec<OkxOrder> = self.signed_request(Method::GET, &path, None).await?;
        orders
            .into_iter()
            .map(|order| order.into_order(symbol))
            .collect()
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<Order> {
        let inst_id = Self::inst_id(&request.symbol)?;
        let precision = self.precision(&inst_id).await?;

        let amount = precision.align_amount(request.amount)?;

        let (ord_type, price, tgt_ccy) = match request.order_type {
            OrderType::Limit => {
                let price = request.price.ok_or(ExchangeError::MissingField("price"))?;
                ("limit", Some(precision.align_price(price)?), None)
            }
            // Size market orders in the base currency, like limit orders
            OrderType::Market => ("market", None, Some("base_ccy")),
        };

        let body = PlaceOrderBody {
            inst_id,
            td_mode: "cash",
            side: request.side.as_str(),
            ord_type,
            sz: amount.to_string(),
            px: price.map(|p| p.to_string()),
            tgt_ccy,
        };
        let acks: Vec<OkxOrderAck> = self
            .signed_request(
                Method::POST,
                "/api/v5/trade/order",
                Some(serde_json::to_string(&body)?),
            )
            .await?;

        let ack = acks
            .into_iter()
            .next()
            .ok_or(ExchangeError::MissingField("data"))?;
        if !ack.s_code.is_empty() && ack.s_code != "0" {
            return Err(ExchangeError::Rejected(format!(
                "{}: {}",
                ack.s_code, ack.s_msg
            )));
        }

        Ok(Order {
            id: ack.ord_id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            amount: to_f64(amount)?,
            price: price.map(to_f64).transpose()?,
            status: OrderStatus::Open,
        })
    }

    async fn cancel_order(&self, id: &str, symbol: &str) -> ExchangeResult<()> {
        let body = CancelOrderBody {
            inst_id: Self::inst_id(symbol)?,
            ord_id: id.to_string(),
        };
        let _: Vec<Value> = self
            .signed_request(
                Method::POST,
                "/api/v5/trade/cancel-order",
                Some(serde_json::to_string(&body)?),
            )
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
        let mut path = format!(
            "/api/v5/market/candles?instId={}&bar={}",
            Self::inst_id(symbol)?,
            bar_for_timeframe(timeframe)
        );
        if let Some(start) = since {
            // `before` returns records newer than the timestamp
            path.push_str(&format!("&before={}", start - 1));
        }
        if let Some(l) = limit {
            path.push_str(&format!("&limit={}", l.min(300)));
        }

        let rows: Vec<Vec<String>> = self.public_get(&path).await?;
        let mut candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                if row.len() < 6 {
                    return None;
                }
                let datetime: DateTime<Utc> =
                    DateTime::from_timestamp_millis(row[0].parse().ok()?)?;
                Candle::new(
                    datetime,
                    row[1].parse().ok()?,
                    row[2].parse().ok()?,
                    row[3].parse().ok()?,
                    row[4].parse().ok()?,
                    row[5].parse().ok()?,
                )
                .ok()
            })
            .collect();
        // Newest first on the wire
        candles.reverse();
        Ok(candles)
    }
}
