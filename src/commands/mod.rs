//! Subcommand implementations

pub mod mm;
pub mod orderbook;
pub mod swing;

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use market_bots::config::{config_path_for_token, BotsConfig, ResolvedBot};
use market_bots::exchange::{create_exchange, ClientConfig, Exchange, PaperExchange};
use market_bots::prompt::Prompter;

/// Build a single-threaded runtime; every bot awaits its calls in sequence
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

/// Token, config file and bot, from flags or prompts
pub(crate) fn select_bot<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config_dir: &Path,
    token: Option<String>,
    bot_name: Option<String>,
) -> Result<(PathBuf, ResolvedBot)> {
    let token = match token {
        Some(token) => token,
        None => prompter.ask_token()?,
    };

    let config_path = config_path_for_token(config_dir, &token);
    let config = BotsConfig::from_file(&config_path)?;
    config.ensure_token(&token)?;

    let bot_name = match bot_name {
        Some(name) => name,
        None => {
            let names = config.bot_names();
            let index = prompter.select_bot(&names)?;
            names[index].to_string()
        }
    };

    let mut bot = config.resolve(&bot_name)?;
    bot.apply_env_overrides();
    info!("Selected bot {} ({} on {})", bot.name, bot.pair, bot.bot.exchange);
    Ok((config_path, bot))
}

pub(crate) fn connect(bot: &ResolvedBot) -> Result<Arc<dyn Exchange>> {
    create_exchange(&bot.bot.exchange, &bot.credentials, ClientConfig::default())
        .with_context(|| format!("Failed to initialize exchange {}", bot.bot.exchange))
}

/// Paper account over `source`, seeded with its balances when readable
pub(crate) async fn paper_over(source: Arc<dyn Exchange>) -> Arc<dyn Exchange> {
    match PaperExchange::mirror(source.clone()).await {
        Ok(paper) => Arc::new(paper),
        Err(e) => {
            warn!(
                "Could not read balances from {} ({}); paper account starts empty",
                source.id(),
                e
            );
            Arc::new(PaperExchange::with_market_data(source))
        }
    }
}
