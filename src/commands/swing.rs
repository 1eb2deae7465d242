//! Swing Strategy Command

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{error, info};

use market_bots::config::ExchangeCredentials;
use market_bots::error::PromptError;
use market_bots::exchange::{create_exchange, ClientConfig};
use market_bots::prompt::Prompter;
use market_bots::swing::{SwingParams, SwingStrategy};
use market_bots::types::TradingPair;

use super::{paper_over, runtime};

pub const ENV_BINANCE_API_KEY: &str = "BINANCE_API_KEY";
pub const ENV_BINANCE_API_SECRET: &str = "BINANCE_API_SECRET";

fn trading_pair<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    flag: Option<String>,
) -> Result<TradingPair> {
    let raw = match flag {
        Some(pair) => pair,
        None => {
            prompter.ask_with_default("Enter the trading pair (e.g., BTC/USDT): ", "BTC/USDT")?
        }
    };
    let pair: TradingPair = raw
        .to_uppercase()
        .parse()
        .with_context(|| format!("Invalid trading pair {}", raw))?;
    Ok(pair)
}

fn position_size<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    flag: Option<f64>,
) -> Result<f64> {
    let size = match flag {
        Some(size) => size,
        None => {
            let raw =
                prompter.ask_with_default("Enter the position size (e.g., 0.001): ", "0.001")?;
            raw.parse().map_err(|_| PromptError::NotANumber(raw))?
        }
    };
    if size.is_nan() || size <= 0.0 {
        return Err(PromptError::NotPositive(size).into());
    }
    Ok(size)
}

/// Anything other than `test` means live trading
fn test_mode<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    flag: Option<String>,
) -> Result<bool> {
    let mode = match flag {
        Some(mode) => mode,
        None => prompter.ask_with_default(
            "Enter 'test' for simulated signals or 'live' for live trading: ",
            "live",
        )?,
    };
    Ok(mode.trim().eq_ignore_ascii_case("test"))
}

fn credentials_from_env() -> ExchangeCredentials {
    ExchangeCredentials {
        api_key: std::env::var(ENV_BINANCE_API_KEY).unwrap_or_default(),
        api_secret: std::env::var(ENV_BINANCE_API_SECRET).unwrap_or_default(),
        api_password: None,
    }
}

pub fn run(
    pair: Option<String>,
    size: Option<f64>,
    mode: Option<String>,
    exchange: String,
    paper: bool,
) -> Result<()> {
    dotenv::dotenv().ok();

    let mut prompter = Prompter::stdio();
    let trading_pair = trading_pair(&mut prompter, pair)?;
    info!("Using trading pair: {}", trading_pair);
    let position_size = position_size(&mut prompter, size)?;
    info!("Using position size: {}", position_size);
    let test_mode = test_mode(&mut prompter, mode)?;

    let params = SwingParams {
        trading_pair,
        position_size,
        test_mode,
        ..SwingParams::default()
    };

    let runtime = runtime()?;
    runtime.block_on(run_async(params, exchange, paper))
}

async fn run_async(params: SwingParams, exchange_name: String, paper: bool) -> Result<()> {
    let mut exchange = create_exchange(
        &exchange_name,
        &credentials_from_env(),
        ClientConfig::default(),
    )
    .with_context(|| format!("Failed to initialize exchange {}", exchange_name))?;
    if paper {
        info!("PAPER mode: orders are simulated");
        exchange = paper_over(exchange).await;
    }

    let strategy = SwingStrategy::new(exchange, params);

    tokio::select! {
        _ = strategy.run() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received Ctrl+C, shutting down..."),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    Ok(())
}
