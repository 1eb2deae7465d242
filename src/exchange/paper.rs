//! In-memory paper trading account
//!
//! Limit orders lock funds (quote for buys, base for sells) until they are
//! filled or cancelled; market orders fill immediately at the touch. Prices
//! and candles come from values set on the account or, when configured, from
//! a live adapter used read-only.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::{ExchangeError, ExchangeResult};
use super::Exchange;
use crate::types::{
    Balance, Candle, Order, OrderRequest, OrderStatus, OrderType, Side, Ticker, TradingPair,
};

/// Relative slack when comparing a cost against a balance
const BALANCE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Default, Clone, Copy)]
struct Funds {
    free: f64,
    used: f64,
}

#[derive(Debug, Default)]
struct PaperState {
    funds: BTreeMap<String, Funds>,
    tickers: HashMap<String, Ticker>,
    candles: HashMap<String, Vec<Candle>>,
    positions: HashMap<String, f64>,
    open_orders: Vec<Order>,
    next_id: u64,
    pending_failures: usize,
}

impl PaperState {
    fn funds_mut(&mut self, currency: &str) -> &mut Funds {
        self.funds.entry(currency.to_string()).or_default()
    }

    fn reserve(&mut self, currency: &str, amount: f64) -> ExchangeResult<()> {
        let funds = self.funds_mut(currency);
        let slack = BALANCE_TOLERANCE * funds.free.abs().max(1.0);
        if amount > funds.free + slack {
            return Err(ExchangeError::InsufficientFunds {
                currency: currency.to_string(),
                required: amount,
                available: funds.free,
            });
        }
        let amount = amount.min(funds.free);
        funds.free -= amount;
        funds.used += amount;
        Ok(())
    }

    fn release(&mut self, currency: &str, amount: f64) {
        let funds = self.funds_mut(currency);
        let amount = amount.min(funds.used);
        funds.used -= amount;
        funds.free += amount;
    }

    fn spend_locked(&mut self, currency: &str, amount: f64) {
        let funds = self.funds_mut(currency);
        funds.used = (funds.used - amount).max(0.0);
    }

    fn spend_free(&mut self, currency: &str, amount: f64) -> ExchangeResult<()> {
        self.reserve(currency, amount)?;
        self.spend_locked(currency, amount);
        Ok(())
    }

    fn credit(&mut self, currency: &str, amount: f64) {
        self.funds_mut(currency).free += amount;
    }

    fn next_order_id(&mut self) -> String {
        self.next_id += 1;
        format!("paper-{}", self.next_id)
    }

    fn take_open_order(&mut self, id: &str) -> ExchangeResult<Order> {
        let index = self
            .open_orders
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| ExchangeError::OrderNotFound(id.to_string()))?;
        Ok(self.open_orders.remove(index))
    }
}

fn pair_of(symbol: &str) -> ExchangeResult<TradingPair> {
    symbol
        .parse()
        .map_err(|_| ExchangeError::parse("symbol", symbol))
}

/// Simulated exchange account
pub struct PaperExchange {
    state: Mutex<PaperState>,
    market_data: Option<Arc<dyn Exchange>>,
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperExchange {
    /// Empty account without a market data source
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PaperState::default()),
            market_data: None,
        }
    }

    /// Read tickers and candles from `source` when none were set locally
    pub fn with_market_data(source: Arc<dyn Exchange>) -> Self {
        Self {
            state: Mutex::new(PaperState::default()),
            market_data: Some(source),
        }
    }

    /// Paper account that starts from `source`'s current free balances
    pub async fn mirror(source: Arc<dyn Exchange>) -> ExchangeResult<Self> {
        let balance = source.fetch_balance().await?;
        let paper = Self::with_market_data(source);
        {
            let mut state = paper.state.lock().await;
            for (currency, free) in &balance.free {
                state.funds_mut(currency).free = *free;
            }
        }
        info!(
            "Paper account seeded with {} balance(s) from {}",
            balance.free.len(),
            paper.market_data.as_ref().map(|s| s.id()).unwrap_or("none")
        );
        Ok(paper)
    }

    pub async fn set_balance(&self, currency: &str, free: f64) {
        let mut state = self.state.lock().await;
        state.funds_mut(currency).free = free;
    }

    pub async fn set_ticker(&self, symbol: &str, bid: f64, ask: f64) {
        let mut state = self.state.lock().await;
        state.tickers.insert(
            symbol.to_string(),
            Ticker {
                symbol: symbol.to_string(),
                bid: Some(bid),
                ask: Some(ask),
                last: Some((bid + ask) / 2.0),
            },
        );
    }

    pub async fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        let mut state = self.state.lock().await;
        state.candles.insert(symbol.to_string(), candles);
    }

    pub async fn set_position(&self, symbol: &str, amount: f64) {
        let mut state = self.state.lock().await;
        state.positions.insert(symbol.to_string(), amount);
    }

    /// Reject the next `count` order submissions
    pub async fn fail_next_orders(&self, count: usize) {
        self.state.lock().await.pending_failures = count;
    }

    /// Fill an open limit order at its price, settling the locked funds
    pub async fn fill_order(&self, id: &str) -> ExchangeResult<Order> {
        let mut state = self.state.lock().await;
        let mut order = state.take_open_order(id)?;
        let pair = pair_of(&order.symbol)?;
        let price = order.price.unwrap_or(0.0);

        match order.side {
            Side::Buy => {
                state.spend_locked(pair.quote(), order.amount * price);
                state.credit(pair.base(), order.amount);
                *state.positions.entry(order.symbol.clone()).or_default() += order.amount;
            }
            Side::Sell => {
                state.spend_locked(pair.base(), order.amount);
                state.credit(pair.quote(), order.amount * price);
                *state.positions.entry(order.symbol.clone()).or_default() -= order.amount;
            }
        }

        order.status = OrderStatus::Closed;
        debug!("Paper order {} filled", id);
        Ok(order)
    }

    /// Every submitted order that is still open, in submission order
    pub async fn open_orders(&self) -> Vec<Order> {
        self.state.lock().await.open_orders.clone()
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn id(&self) -> &'static str {
        "paper"
    }

    async fn fetch_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        if let Some(ticker) = self.state.lock().await.tickers.get(symbol) {
            return Ok(ticker.clone());
        }
        match &self.market_data {
            Some(source) => source.fetch_ticker(symbol).await,
            None => Err(ExchangeError::NoMarketData(symbol.to_string())),
        }
    }

    async fn fetch_balance(&self) -> ExchangeResult<Balance> {
        let state = self.state.lock().await;
        let mut balance = Balance::default();
        for (currency, funds) in &state.funds {
            balance.insert(currency.clone(), funds.free, funds.used);
        }
        Ok(balance)
    }

    async fn fetch_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .open_orders
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn create_order(&self, request: &OrderRequest) -> ExchangeResult<Order> {
        let pair = pair_of(&request.symbol)?;
        if request.amount <= 0.0 {
            return Err(ExchangeError::Rejected(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        {
            let mut state = self.state.lock().await;
            if state.pending_failures > 0 {
                state.pending_failures -= 1;
                return Err(ExchangeError::Rejected("simulated rejection".to_string()));
            }
        }

        match request.order_type {
            OrderType::Limit => {
                let price = request.price.ok_or(ExchangeError::MissingField("price"))?;
                let mut state = self.state.lock().await;
                match request.side {
                    Side::Buy => state.reserve(pair.quote(), request.amount * price)?,
                    Side::Sell => state.reserve(pair.base(), request.amount)?,
                }

                let order = Order {
                    id: state.next_order_id(),
                    symbol: request.symbol.clone(),
                    side: request.side,
                    order_type: OrderType::Limit,
                    amount: request.amount,
                    price: Some(price),
                    status: OrderStatus::Open,
                };
                state.open_orders.push(order.clone());
                debug!(
                    "Paper limit {} {} {} @ {}",
                    order.side, order.amount, order.symbol, price
                );
                Ok(order)
            }
            OrderType::Market => {
                let ticker = self.fetch_ticker(&request.symbol).await?;
                let touch = match request.side {
                    Side::Buy => ticker.ask,
                    Side::Sell => ticker.bid,
                };
                let price = touch
                    .or(ticker.last)
                    .ok_or_else(|| ExchangeError::NoMarketData(request.symbol.clone()))?;

                let mut state = self.state.lock().await;
                match request.side {
                    Side::Buy => {
                        state.spend_free(pair.quote(), request.amount * price)?;
                        state.credit(pair.base(), request.amount);
                        *state.positions.entry(request.symbol.clone()).or_default() +=
                            request.amount;
                    }
                    Side::Sell => {
                        state.spend_free(pair.base(), request.amount)?;
                        state.credit(pair.quote(), request.amount * price);
                        *state.positions.entry(request.symbol.clone()).or_default() -=
                            request.amount;
                    }
                }

                Ok(Order {
                    id: state.next_order_id(),
                    symbol: request.symbol.clone(),
                    side: request.side,
                    order_type: OrderType::Market,
                    amount: request.amount,
                    price: Some(price),
                    status: OrderStatus::Closed,
                })
            }
        }
    }

    async fn cancel_order(&self, id: &str, _symbol: &str) -> ExchangeResult<()> {
        let mut state = self.state.lock().await;
        let order = state.take_open_order(id)?;
        let pair = pair_of(&order.symbol)?;
        match order.side {
            Side::Buy => state.release(pair.quote(), order.amount * order.price.unwrap_or(0.0)),
            Side::Sell => state.release(pair.base(), order.amount),
        }
        Ok(())
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        since: Option<i64>,
        limit: Option<u32>,
    ) -> ExchangeResult<Vec<Candle>> {
        let local = self.state.lock().await.candles.get(symbol).cloned();
        match (local, &self.market_data) {
            (Some(candles), _) => {
                let mut candles: Vec<Candle> = candles
                    .into_iter()
                    .filter(|c| since.map_or(true, |s| c.datetime.timestamp_millis() >= s))
                    .collect();
                if let Some(limit) = limit {
                    let excess = candles.len().saturating_sub(limit as usize);
                    candles.drain(..excess);
                }
                Ok(candles)
            }
            (None, Some(source)) => source.fetch_ohlcv(symbol, timeframe, since, limit).await,
            (None, None) => Err(ExchangeError::NoMarketData(symbol.to_string())),
        }
    }

    async fn fetch_position(&self, symbol: &str) -> ExchangeResult<f64> {
        Ok(self
            .state
            .lock()
            .await
            .positions
            .get(symbol)
            .copied()
            .unwrap_or(0.0))
    }
}
