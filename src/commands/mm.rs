//! Market Maker Command
//!
//! Interactive flow: pick a bot, optionally show balances/orders and clear
//! the book, then ask for the order amount and depth and run the ladder loop
//! until Ctrl+C.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use market_bots::error::PromptError;
use market_bots::market_maker::{LimitOrderMarketMaker, MarketMakerParams};
use market_bots::prompt::{Prompter, MAX_ORDER_LEVELS};

use super::{connect, paper_over, runtime, select_bot};

#[derive(Debug)]
pub struct MmOptions {
    pub config_dir: PathBuf,
    pub token: Option<String>,
    pub bot: Option<String>,
    pub amount: Option<f64>,
    pub levels: Option<usize>,
    pub spread: f64,
    pub interval: u64,
    pub paper: bool,
    pub show_balance: Option<bool>,
    pub show_orders: Option<bool>,
    pub clear_orders: Option<bool>,
    pub run: Option<bool>,
}

fn flag_or_confirm<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    flag: Option<bool>,
    question: &str,
) -> Result<bool> {
    match flag {
        Some(value) => Ok(value),
        None => Ok(prompter.confirm(question)?),
    }
}

/// Only an explicit "n" stops before the trading loop
fn run_unless_declined<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    flag: Option<bool>,
) -> Result<bool> {
    match flag {
        Some(value) => Ok(value),
        None => Ok(prompter.confirm_unless_declined("Do you want to run the bot?")?),
    }
}

fn order_amount<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    flag: Option<f64>,
) -> Result<f64> {
    match flag {
        Some(amount) if amount > 0.0 => Ok(amount),
        Some(amount) => Err(PromptError::NotPositive(amount).into()),
        None => Ok(prompter.ask_order_amount()?),
    }
}

fn order_levels<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    flag: Option<usize>,
) -> Result<usize> {
    match flag {
        Some(levels) if (1..=MAX_ORDER_LEVELS).contains(&levels) => Ok(levels),
        Some(levels) => Err(PromptError::LevelsOutOfRange {
            value: levels as i64,
            max: MAX_ORDER_LEVELS,
        }
        .into()),
        None => Ok(prompter.ask_order_levels()?),
    }
}

pub fn run(options: MmOptions) -> Result<()> {
    dotenv::dotenv().ok();

    let runtime = runtime()?;
    runtime.block_on(run_async(options))
}

async fn run_async(options: MmOptions) -> Result<()> {
    let mut prompter = Prompter::stdio();

    let (_, bot) = select_bot(
        &mut prompter,
        &options.config_dir,
        options.token.clone(),
        options.bot.clone(),
    )?;

    let mut exchange = connect(&bot)?;
    if options.paper {
        info!("PAPER mode: orders are simulated");
        exchange = paper_over(exchange).await;
    }

    let params = MarketMakerParams {
        max_spread: options.spread,
        loop_interval: Duration::from_secs(options.interval),
        ..MarketMakerParams::default()
    };
    let mut bot_runner = LimitOrderMarketMaker::new(&bot, exchange, params.clone())
        .context("Invalid market maker parameters")?;

    if flag_or_confirm(&mut prompter, options.show_balance, "Do you want to show balance?")? {
        bot_runner
            .show_balance()
            .await
            .context("Failed to fetch balance")?;
        info!("{}", "=".repeat(50));
    }

    if flag_or_confirm(&mut prompter, options.show_orders, "Do you want to show open orders?")? {
        bot_runner
            .show_orders()
            .await
            .context("Failed to fetch open orders")?;
        info!("{}", "=".repeat(50));
    }

    if flag_or_confirm(
        &mut prompter,
        options.clear_orders,
        "Do you want to clear all open orders?",
    )? {
        let canceled = bot_runner.clear_orders().await;
        info!("Canceled {} order(s)", canceled);
        info!("{}", "=".repeat(50));
    }

    if !run_unless_declined(&mut prompter, options.run)? {
        info!("Exiting without running the bot");
        return Ok(());
    }

    let amount = order_amount(&mut prompter, options.amount)?;
    let levels = order_levels(&mut prompter, options.levels)?;
    bot_runner
        .set_params(MarketMakerParams {
            base_order_amount: amount,
            order_levels: levels,
            ..params
        })
        .context("Invalid market maker parameters")?;

    tokio::select! {
        _ = bot_runner.run() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    Ok(())
}
