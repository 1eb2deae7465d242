//! Market bots - main entry point
//!
//! This binary provides three subcommands:
//! - mm: Run the limit-order market maker for a configured bot
//! - swing: Run the 45-minute SMA swing strategy
//! - orderbook: Watch a bot's open orders and balances

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "market-bots")]
#[command(about = "Market making, swing trading and order-book inspection bots", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the limit-order market maker
    Mm {
        /// Directory holding {token}_bots.json files
        #[arg(long, default_value = market_bots::config::DEFAULT_CONFIG_DIR)]
        config_dir: PathBuf,

        /// Config token (prompted when omitted)
        #[arg(short, long)]
        token: Option<String>,

        /// Bot name from the config (prompted when omitted)
        #[arg(short, long)]
        bot: Option<String>,

        /// Base order amount per level (prompted when omitted)
        #[arg(short, long)]
        amount: Option<f64>,

        /// Number of order levels per side, 1-10 (prompted when omitted)
        #[arg(short, long)]
        levels: Option<usize>,

        /// Maximum total spread from mid-price, as a fraction below 1.0
        #[arg(long, default_value_t = market_bots::market_maker::DEFAULT_MAX_SPREAD)]
        spread: f64,

        /// Seconds between cycles
        #[arg(long, default_value_t = market_bots::market_maker::DEFAULT_LOOP_INTERVAL.as_secs())]
        interval: u64,

        /// Simulate orders against a paper account seeded from the exchange
        #[arg(long)]
        paper: bool,

        /// Show balances before starting (prompted when omitted)
        #[arg(long)]
        show_balance: Option<bool>,

        /// Show open orders before starting (prompted when omitted)
        #[arg(long)]
        show_orders: Option<bool>,

        /// Cancel all open orders before starting (prompted when omitted)
        #[arg(long)]
        clear_orders: Option<bool>,

        /// Start the trading loop (prompted when omitted)
        #[arg(long)]
        run: Option<bool>,
    },

    /// Run the swing trading strategy
    Swing {
        /// Trading pair, e.g. BTC/USDT (prompted when omitted)
        #[arg(short, long)]
        pair: Option<String>,

        /// Position size in base currency (prompted when omitted)
        #[arg(short, long)]
        size: Option<f64>,

        /// "test" simulates orders, "live" places them (prompted when omitted)
        #[arg(short, long)]
        mode: Option<String>,

        /// Exchange adapter
        #[arg(short, long, default_value = "binanceusdm")]
        exchange: String,

        /// Route orders to a paper account instead of the exchange
        #[arg(long)]
        paper: bool,
    },

    /// Watch a bot's open orders and balances
    Orderbook {
        /// Directory holding {token}_bots.json files
        #[arg(long, default_value = market_bots::config::DEFAULT_CONFIG_DIR)]
        config_dir: PathBuf,

        /// Config token (prompted when omitted)
        #[arg(short, long)]
        token: Option<String>,

        /// Bot name from the config (prompted when omitted)
        #[arg(short, long)]
        bot: Option<String>,

        /// Seconds between refreshes
        #[arg(long, default_value_t = market_bots::order_book::DEFAULT_REFRESH_INTERVAL.as_secs())]
        interval: u64,

        /// Cancel all open orders once before watching
        #[arg(long)]
        clear_orders: bool,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // logs/{command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // Same format, no ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Mm { .. } => "mm",
        Commands::Swing { .. } => "swing",
        Commands::Orderbook { .. } => "orderbook",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Mm {
            config_dir,
            token,
            bot,
            amount,
            levels,
            spread,
            interval,
            paper,
            show_balance,
            show_orders,
            clear_orders,
            run,
        } => commands::mm::run(commands::mm::MmOptions {
            config_dir,
            token,
            bot,
            amount,
            levels,
            spread,
            interval,
            paper,
            show_balance,
            show_orders,
            clear_orders,
            run,
        }),

        Commands::Swing {
            pair,
            size,
            mode,
            exchange,
            paper,
        } => commands::swing::run(pair, size, mode, exchange, paper),

        Commands::Orderbook {
            config_dir,
            token,
            bot,
            interval,
            clear_orders,
        } => commands::orderbook::run(config_dir, token, bot, interval, clear_orders),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_defaults_follow_library_constants() {
        let cli = Cli::try_parse_from(["market-bots", "orderbook"]).unwrap();
        match cli.command {
            Commands::Orderbook { interval, .. } => assert_eq!(interval, 20),
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["market-bots", "mm"]).unwrap();
        match cli.command {
            Commands::Mm {
                spread, interval, ..
            } => {
                assert_eq!(spread, 0.02);
                assert_eq!(interval, 30);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_refresh_interval_flag_overrides_default() {
        let cli = Cli::try_parse_from(["market-bots", "orderbook", "--interval", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Orderbook { interval: 5, .. }));
    }
}
