//! Read-only view of a bot's open orders and balances

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::{BotsConfig, ResolvedBot};
use crate::exchange::{Exchange, ExchangeResult};
use crate::types::{Balance, Order};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(20);

/// One line per order: `id: side amount @ price`
pub fn format_orders(orders: &[Order]) -> Vec<String> {
    orders
        .iter()
        .map(|order| match order.price {
            Some(price) => format!("{}: {} {} @ {}", order.id, order.side, order.amount, price),
            None => format!("{}: {} {} @ market", order.id, order.side, order.amount),
        })
        .collect()
}

/// Pretty-printed total, used and free maps
pub fn format_balance(bot_name: &str, balance: &Balance) -> serde_json::Result<String> {
    Ok(format!(
        "Balance for {}:\nCurrent: {}\nUsed: {}\nAvailable: {}",
        bot_name,
        serde_json::to_string_pretty(&balance.total)?,
        serde_json::to_string_pretty(&balance.used)?,
        serde_json::to_string_pretty(&balance.free)?,
    ))
}

pub struct OrderBookInspector {
    bot: ResolvedBot,
    exchange: Arc<dyn Exchange>,
}

impl OrderBookInspector {
    pub fn new(bot: ResolvedBot, exchange: Arc<dyn Exchange>) -> Self {
        Self { bot, exchange }
    }

    /// Resolve `bot_name` from the config file and connect to its exchange
    pub fn load<F>(config_path: &Path, bot_name: &str, connect: F) -> Result<Self>
    where
        F: Fn(&ResolvedBot) -> ExchangeResult<Arc<dyn Exchange>>,
    {
        let config = BotsConfig::from_file(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        let mut bot = config.resolve(bot_name)?;
        bot.apply_env_overrides();
        let exchange = connect(&bot)
            .with_context(|| format!("Failed to initialize exchange {}", bot.bot.exchange))?;
        Ok(Self::new(bot, exchange))
    }

    pub fn bot(&self) -> &ResolvedBot {
        &self.bot
    }

    pub async fn show_orders(&self) -> ExchangeResult<Vec<Order>> {
        let orders = self.exchange.fetch_open_orders(&self.bot.pair.symbol()).await?;
        info!("Open orders:");
        for line in format_orders(&orders) {
            info!("{}", line);
        }
        Ok(orders)
    }

    pub async fn show_balance(&self) -> ExchangeResult<Balance> {
        let balance = self.exchange.fetch_balance().await?;
        info!("{}", "=".repeat(50));
        info!("{}", format_balance(&self.bot.name, &balance)?);
        Ok(balance)
    }

    /// Cancel every open order on the pair; stops at the first failure
    pub async fn clear_orders(&self) -> ExchangeResult<usize> {
        let symbol = self.bot.pair.symbol();
        let open_orders = self.exchange.fetch_open_orders(&symbol).await?;
        for order in &open_orders {
            self.exchange.cancel_order(&order.id, &symbol).await?;
            info!("Canceled order: {}", order.id);
        }
        Ok(open_orders.len())
    }
}

/// Re-read the config, connect, and show orders then balance
pub async fn inspect_once<F>(config_path: &Path, bot_name: &str, connect: &F) -> Result<()>
where
    F: Fn(&ResolvedBot) -> ExchangeResult<Arc<dyn Exchange>>,
{
    let inspector = OrderBookInspector::load(config_path, bot_name, connect)?;
    inspector
        .show_orders()
        .await
        .context("Failed to fetch open orders")?;
    info!("{}", "=".repeat(50));
    inspector
        .show_balance()
        .await
        .context("Failed to fetch balance")?;
    info!("{}", "=".repeat(50));
    Ok(())
}

/// Refresh forever; the config file is re-read on every pass
pub async fn run<F>(config_path: PathBuf, bot_name: String, interval: Duration, connect: F)
where
    F: Fn(&ResolvedBot) -> ExchangeResult<Arc<dyn Exchange>>,
{
    loop {
        if let Err(e) = inspect_once(&config_path, &bot_name, &connect).await {
            error!("Error inspecting {}: {:#}", bot_name, e);
        }
        sleep(interval).await;
    }
}
