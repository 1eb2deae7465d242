//! Order Book Command

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use market_bots::config::ResolvedBot;
use market_bots::exchange::{create_exchange, ClientConfig};
use market_bots::order_book::{self, OrderBookInspector};
use market_bots::prompt::Prompter;

use super::{connect, runtime, select_bot};

pub fn run(
    config_dir: PathBuf,
    token: Option<String>,
    bot: Option<String>,
    interval: u64,
    clear_orders: bool,
) -> Result<()> {
    dotenv::dotenv().ok();

    let mut prompter = Prompter::stdio();
    let (config_path, resolved) = select_bot(&mut prompter, &config_dir, token, bot)?;

    let runtime = runtime()?;
    runtime.block_on(async move {
        if clear_orders {
            let inspector = OrderBookInspector::new(resolved.clone(), connect(&resolved)?);
            let canceled = inspector
                .clear_orders()
                .await
                .context("Failed to clear open orders")?;
            info!("Canceled {} order(s)", canceled);
        }

        let connect_fn = |bot: &ResolvedBot| {
            create_exchange(&bot.bot.exchange, &bot.credentials, ClientConfig::default())
        };

        let refresh = Duration::from_secs(interval);
        tokio::select! {
            _ = order_book::run(config_path, resolved.name.clone(), refresh, connect_fn) => {}
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down..."),
                    Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
                }
            }
        }

        Ok::<(), anyhow::Error>(())
    })
}
