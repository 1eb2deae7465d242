//! Limit-order market maker
//!
//! Each cycle keeps a symmetric ladder of limit orders around mid-price.
//! When any tracked order is no longer open (filled or cancelled
//! elsewhere), everything is cancelled and the ladder is rebuilt at the new
//! mid-price.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::ResolvedBot;
use crate::exchange::{Exchange, ExchangeError, ExchangeResult};
use crate::ladder::{build_ladder, ClampReport, LadderError, LadderParams, Rung};
use crate::orders::ActiveOrders;
use crate::types::{Side, TradingPair};

/// Maximum total distance from mid-price, 2%
pub const DEFAULT_MAX_SPREAD: f64 = 0.02;

/// Pause between cycles, and after a failed cycle
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_secs(30);

/// Tunables for the market maker
#[derive(Debug, Clone, PartialEq)]
pub struct MarketMakerParams {
    pub base_order_amount: f64,
    pub order_levels: usize,
    pub max_spread: f64,
    pub loop_interval: Duration,
}

impl Default for MarketMakerParams {
    fn default() -> Self {
        Self {
            base_order_amount: 0.0,
            order_levels: 3,
            max_spread: DEFAULT_MAX_SPREAD,
            loop_interval: DEFAULT_LOOP_INTERVAL,
        }
    }
}

impl MarketMakerParams {
    pub fn ladder_params(&self) -> Result<LadderParams, LadderError> {
        LadderParams::new(self.max_spread, self.order_levels, self.base_order_amount)
    }
}

/// Outcome of one [`LimitOrderMarketMaker::place_limit_orders`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementReport {
    pub placed: usize,
    pub failed: usize,
    /// Rungs left with a non-positive amount after clamping
    pub skipped: usize,
    pub clamp: ClampReport,
}

pub struct LimitOrderMarketMaker {
    bot_name: String,
    exchange: Arc<dyn Exchange>,
    pair: TradingPair,
    params: MarketMakerParams,
    ladder: LadderParams,
    active_orders: ActiveOrders,
}

impl LimitOrderMarketMaker {
    pub fn new(
        bot: &ResolvedBot,
        exchange: Arc<dyn Exchange>,
        params: MarketMakerParams,
    ) -> Result<Self, LadderError> {
        let ladder = params.ladder_params()?;

        info!("{}", "=".repeat(50));
        info!("Initializing Limit Order Market Maker bot...");
        info!("{}", "-".repeat(50));
        info!("Bot name: {}", bot.name);
        info!("Exchange: {}", exchange.id());
        info!("Trading pair: {}", bot.pair);
        info!("Base order amount: {}", params.base_order_amount);
        info!("Order levels: {}", params.order_levels);
        info!("{}", "=".repeat(50));

        Ok(Self {
            bot_name: bot.name.clone(),
            exchange,
            pair: bot.pair.clone(),
            params,
            ladder,
            active_orders: ActiveOrders::new(),
        })
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn params(&self) -> &MarketMakerParams {
        &self.params
    }

    pub fn active_orders(&self) -> &ActiveOrders {
        &self.active_orders
    }

    /// Replace amount/levels (e.g. after interactive prompts)
    pub fn set_params(&mut self, params: MarketMakerParams) -> Result<(), LadderError> {
        self.ladder = params.ladder_params()?;
        info!(
            "Parameters updated: amount={}, levels={}, spread per level={:.4}",
            params.base_order_amount,
            params.order_levels,
            self.ladder.spread_per_level()
        );
        self.params = params;
        Ok(())
    }

    pub async fn show_balance(&self) -> ExchangeResult<()> {
        let balance = self.exchange.fetch_balance().await?;
        info!(
            "Current balance: {}",
            serde_json::to_string_pretty(&balance.total)?
        );
        info!(
            "Available balance: {}",
            serde_json::to_string_pretty(&balance.free)?
        );
        Ok(())
    }

    pub async fn show_orders(&self) -> ExchangeResult<()> {
        let open_orders = self.exchange.fetch_open_orders(&self.pair.symbol()).await?;
        info!("Open orders:");
        for order in open_orders {
            info!(
                "{}: {} {} @ {}",
                order.id,
                order.side,
                order.amount,
                order
                    .price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "market".to_string())
            );
        }
        Ok(())
    }

    /// Cancel every open order on the pair and forget the tracked ones
    ///
    /// Failures are logged; returns how many cancellations succeeded.
    pub async fn clear_orders(&mut self) -> usize {
        let symbol = self.pair.symbol();
        let open_orders = match self.exchange.fetch_open_orders(&symbol).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("Error canceling orders: {}", e);
                return 0;
            }
        };

        let mut canceled = 0;
        for order in open_orders {
            match self.exchange.cancel_order(&order.id, &symbol).await {
                Ok(()) => {
                    info!("Canceled order: {}", order.id);
                    canceled += 1;
                }
                Err(e) => error!("Error canceling order {}: {}", order.id, e),
            }
        }

        self.active_orders.clear();
        canceled
    }

    pub async fn mid_price(&self) -> ExchangeResult<f64> {
        let ticker = self.exchange.fetch_ticker(&self.pair.symbol()).await?;
        ticker
            .mid_price()
            .ok_or_else(|| ExchangeError::NoMarketData(format!("{} bid/ask", ticker.symbol)))
    }

    /// Free base and quote balances; a missing currency counts as zero
    pub async fn fetch_balances(&self) -> ExchangeResult<(f64, f64)> {
        let balance = self.exchange.fetch_balance().await?;
        Ok((
            balance.free_of(self.pair.base()),
            balance.free_of(self.pair.quote()),
        ))
    }

    async fn submit_side(&mut self, side: Side, rungs: &[Rung], report: &mut PlacementReport) {
        let symbol = self.pair.symbol();
        for rung in rungs {
            if rung.amount <= 0.0 {
                report.skipped += 1;
                continue;
            }

            let result = match side {
                Side::Buy => {
                    self.exchange
                        .create_limit_buy_order(&symbol, rung.amount, rung.price)
                        .await
                }
                Side::Sell => {
                    self.exchange
                        .create_limit_sell_order(&symbol, rung.amount, rung.price)
                        .await
                }
            };

            match result {
                Ok(order) => {
                    info!(
                        "Placed {} order at level {}: {} amount: {:.6} price: {:.6}",
                        side,
                        rung.level,
                        order.id,
                        order.amount,
                        order.price.unwrap_or(rung.price)
                    );
                    self.active_orders.push(order);
                    report.placed += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to place {} order at level {}: {}",
                        side, rung.level, e
                    );
                    report.failed += 1;
                }
            }
        }
    }

    /// Build the ladder at the current mid-price and submit it level by level
    pub async fn place_limit_orders(&mut self) -> ExchangeResult<PlacementReport> {
        let mid_price = self.mid_price().await?;
        let (base_balance, quote_balance) = self.fetch_balances().await?;

        let mut ladder = build_ladder(mid_price, &self.ladder);
        let clamp = ladder.clamp_to_balances(base_balance, quote_balance);

        if let Some(factor) = clamp.buy_factor {
            warn!("Insufficient quote balance to place all buy orders.");
            info!("Adjusted buy order amounts by scaling factor {:.2}", factor);
        }
        if let Some(factor) = clamp.sell_factor {
            warn!("Insufficient base balance to place all sell orders.");
            info!("Adjusted sell order amounts by scaling factor {:.2}", factor);
        }

        let mut report = PlacementReport {
            clamp,
            ..PlacementReport::default()
        };
        self.submit_side(Side::Buy, &ladder.buys, &mut report).await;
        self.submit_side(Side::Sell, &ladder.sells, &mut report).await;

        Ok(report)
    }

    /// Drop tracked orders that are no longer open; rebuild when any are gone
    ///
    /// Returns true when the ladder was replaced.
    pub async fn check_and_replace_orders(&mut self) -> ExchangeResult<bool> {
        let open_orders = self.exchange.fetch_open_orders(&self.pair.symbol()).await?;
        self.active_orders
            .retain_open(open_orders.iter().map(|o| o.id.as_str()));

        if self.active_orders.len() < self.params.order_levels * 2 {
            info!("Some orders have been filled or canceled. Replacing orders.");
            self.clear_orders().await;
            self.place_limit_orders().await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn run_cycle(&mut self) -> ExchangeResult<()> {
        if self.active_orders.is_empty() {
            self.place_limit_orders().await?;
        }
        self.check_and_replace_orders().await?;
        Ok(())
    }

    /// Cycle forever; a failed cycle is logged and retried after the same pause
    pub async fn run(&mut self) {
        loop {
            match self.run_cycle().await {
                Ok(()) => {
                    sleep(self.params.loop_interval).await;
                    info!("{}", "=".repeat(50));
                    info!("Running next iteration...");
                }
                Err(e) => {
                    error!("Error in running bot: {}", e);
                    sleep(self.params.loop_interval).await;
                }
            }
        }
    }
}
