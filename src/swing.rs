//! Swing trading on 45-minute candles
//!
//! Every 15 minutes: pull the last 200 fifteen-minute candles, fold them
//! into 45-minute bars, compute SMA/RSI/Bollinger, and go long when price
//! sits more than 5% below the SMA (short when more than 5% above),
//! unless a position in that direction already exists.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::candles::resample;
use crate::exchange::Exchange;
use crate::indicators::{IndicatorFrame, IndicatorSettings};
use crate::types::{Candle, Order, OrderRequest, Side, TimeInForce, TradingPair};

/// Wait used when the boundary wait is not positive, and after an error
pub const RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct SwingParams {
    pub trading_pair: TradingPair,
    pub position_size: f64,
    /// Log signals without submitting orders
    pub test_mode: bool,
    pub timeframe: String,
    pub candle_limit: u32,
    pub resample_minutes: i64,
    pub indicators: IndicatorSettings,
    /// Fractional distance from the SMA that triggers an entry
    pub entry_band: f64,
}

impl Default for SwingParams {
    fn default() -> Self {
        Self {
            trading_pair: TradingPair::new("BTC", "USDT"),
            position_size: 0.001,
            test_mode: false,
            timeframe: "15m".to_string(),
            candle_limit: 200,
            resample_minutes: 45,
            indicators: IndicatorSettings::default(),
            entry_band: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingSignal {
    Buy,
    Sell,
    Hold,
    InsufficientData,
}

/// Entry rule on the latest bar
///
/// Buy when `close < sma * (1 - band)` and the position is not short-biased
/// against it (`position >= 0`); sell when `close > sma * (1 + band)` and
/// `position <= 0`. Both comparisons are strict.
pub fn signal_for(close: f64, sma: f64, position_amt: f64, entry_band: f64) -> SwingSignal {
    if close < sma * (1.0 - entry_band) && position_amt >= 0.0 {
        SwingSignal::Buy
    } else if close > sma * (1.0 + entry_band) && position_amt <= 0.0 {
        SwingSignal::Sell
    } else {
        SwingSignal::Hold
    }
}

/// Seconds until the next quarter-hour, or 60 when that is not positive
///
/// Exactly on a boundary (e.g. 10:15:00) this waits a full minute rather
/// than re-running immediately.
pub fn seconds_until_next_boundary(now: DateTime<Utc>) -> u64 {
    let sleep_minutes = (15 - (now.minute() as i64 % 15)) % 15;
    let sleep_seconds = sleep_minutes * 60 - now.second() as i64;
    if sleep_seconds > 0 {
        sleep_seconds as u64
    } else {
        RETRY_DELAY.as_secs()
    }
}

pub struct SwingStrategy {
    exchange: Arc<dyn Exchange>,
    params: SwingParams,
}

impl SwingStrategy {
    pub fn new(exchange: Arc<dyn Exchange>, params: SwingParams) -> Self {
        info!(
            "Initialized TradingBot for {} with position size {} on {}{}",
            params.trading_pair,
            params.position_size,
            exchange.id(),
            if params.test_mode { " (test mode)" } else { "" }
        );
        Self { exchange, params }
    }

    pub fn params(&self) -> &SwingParams {
        &self.params
    }

    /// Recent candles, oldest first; errors are logged and yield no candles
    pub async fn fetch_candles(&self, since: Option<DateTime<Utc>>) -> Vec<Candle> {
        let result = self
            .exchange
            .fetch_ohlcv(
                &self.params.trading_pair.symbol(),
                &self.params.timeframe,
                since.map(|t| t.timestamp_millis()),
                Some(self.params.candle_limit),
            )
            .await;

        match result {
            Ok(candles) => candles,
            Err(e) => {
                error!("Error fetching candles: {}", e);
                Vec::new()
            }
        }
    }

    pub fn compute_indicators(&self, candles: &[Candle]) -> IndicatorFrame {
        let bars = resample(
            candles,
            ChronoDuration::minutes(self.params.resample_minutes),
        );
        IndicatorFrame::compute(bars, &self.params.indicators)
    }

    pub fn evaluate(&self, frame: &IndicatorFrame, position_amt: f64) -> SwingSignal {
        match (frame.last_close(), frame.last_sma()) {
            (Some(close), Some(sma)) => {
                signal_for(close, sma, position_amt, self.params.entry_band)
            }
            _ => SwingSignal::InsufficientData,
        }
    }

    /// Signed position on the pair; errors are logged and read as flat
    pub async fn current_position(&self) -> f64 {
        match self
            .exchange
            .fetch_position(&self.params.trading_pair.symbol())
            .await
        {
            Ok(amount) => amount,
            Err(e) => {
                error!("Error fetching current position: {}", e);
                0.0
            }
        }
    }

    /// Limit GTC order when `price` is given, market otherwise
    pub async fn place_order(&self, side: Side, amount: f64, price: Option<f64>) -> Option<Order> {
        let symbol = self.params.trading_pair.symbol();
        let request = match price {
            Some(price) => OrderRequest::limit(symbol, side, amount, price)
                .with_time_in_force(TimeInForce::Gtc),
            None => OrderRequest::market(symbol, side, amount),
        };

        match self.exchange.create_order(&request).await {
            Ok(order) => {
                info!(
                    "Order placed: {} {} {} {} @ {}",
                    order.id,
                    order.side,
                    order.amount,
                    order.symbol,
                    order
                        .price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "market".to_string())
                );
                Some(order)
            }
            Err(e) => {
                error!("Error placing order: {}", e);
                None
            }
        }
    }

    /// Evaluate the latest bar and act on the signal
    pub async fn execute(&self, frame: &IndicatorFrame) -> SwingSignal {
        let (current_price, sma) = match (frame.last_close(), frame.last_sma()) {
            (Some(close), Some(sma)) => (close, sma),
            _ => {
                warn!("Insufficient data to compute indicators.");
                return SwingSignal::InsufficientData;
            }
        };
        info!("Current Price: {}, SMA_45m: {}", current_price, sma);
        if let Some(rsi) = frame.last_rsi() {
            info!("RSI: {:.2}", rsi);
        }

        let position_amt = self.current_position().await;
        info!("Current Position Amount: {}", position_amt);

        let signal = self.evaluate(frame, position_amt);
        let side = match signal {
            SwingSignal::Buy => Side::Buy,
            SwingSignal::Sell => Side::Sell,
            SwingSignal::Hold | SwingSignal::InsufficientData => {
                info!("No trading signal detected.");
                return signal;
            }
        };

        info!("Signal to {}.", side);
        if self.params.test_mode {
            info!("Test Mode: {} order simulated.", side);
        } else {
            self.place_order(side, self.params.position_size, None).await;
        }
        signal
    }

    pub async fn run_iteration(&self) -> Result<SwingSignal> {
        let candles = self.fetch_candles(None).await;
        for candle in &candles {
            candle
                .validate()
                .with_context(|| format!("Invalid candle at {}", candle.datetime))?;
        }

        let frame = self.compute_indicators(&candles);
        Ok(self.execute(&frame).await)
    }

    /// Run forever, waking on each 15-minute boundary
    pub async fn run(&self) {
        loop {
            match self.run_iteration().await {
                Ok(_) => {
                    let wait = seconds_until_next_boundary(Utc::now());
                    info!("Sleeping for {} seconds.", wait);
                    sleep(Duration::from_secs(wait)).await;
                }
                Err(e) => {
                    error!("Error in main loop: {:#}", e);
                    sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}
