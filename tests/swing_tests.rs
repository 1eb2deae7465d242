//! Swing strategy iterations against the paper exchange

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use market_bots::exchange::{Exchange, PaperExchange};
use market_bots::swing::{SwingParams, SwingSignal, SwingStrategy};
use market_bots::types::{Candle, TradingPair};

// =============================================================================
// Test Utilities
// =============================================================================

const SYMBOL: &str = "BTC/USDT";

/// 200 fifteen-minute candles at 100, with the last two closing at `last_close`
fn candles(last_close: f64) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..200)
        .map(|i| {
            let price = if i >= 198 { last_close } else { 100.0 };
            Candle {
                datetime: start + Duration::minutes(15 * i),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 1.0,
            }
        })
        .collect()
}

async fn paper_with(candles: Vec<Candle>, price: f64) -> Arc<PaperExchange> {
    let paper = Arc::new(PaperExchange::new());
    paper.set_candles(SYMBOL, candles).await;
    paper.set_ticker(SYMBOL, price - 0.1, price + 0.1).await;
    paper.set_balance("USDT", 10_000.0).await;
    paper.set_balance("BTC", 1.0).await;
    paper
}

fn strategy(exchange: Arc<PaperExchange>, test_mode: bool) -> SwingStrategy {
    let params = SwingParams {
        trading_pair: TradingPair::new("BTC", "USDT"),
        position_size: 0.01,
        test_mode,
        ..SwingParams::default()
    };
    SwingStrategy::new(exchange, params)
}

// =============================================================================
// Signals
// =============================================================================

#[tokio::test]
async fn test_indicators_run_on_45_minute_bars() {
    let paper = paper_with(candles(100.0), 100.0).await;
    let swing = strategy(paper, true);

    let fetched = swing.fetch_candles(None).await;
    let frame = swing.compute_indicators(&fetched);

    assert_eq!(fetched.len(), 200);
    assert_eq!(frame.len(), 67);
    assert!(frame.sma[43].is_none());
    assert!(frame.last_sma().is_some());
}

#[tokio::test]
async fn test_drop_below_sma_buys() {
    let paper = paper_with(candles(90.0), 90.0).await;
    let swing = strategy(paper.clone(), false);

    let signal = swing.run_iteration().await.unwrap();

    assert_eq!(signal, SwingSignal::Buy);
    assert!((paper.fetch_position(SYMBOL).await.unwrap() - 0.01).abs() < 1e-12);
}

#[tokio::test]
async fn test_rise_above_sma_sells() {
    let paper = paper_with(candles(110.0), 110.0).await;
    let swing = strategy(paper.clone(), false);

    assert_eq!(swing.run_iteration().await.unwrap(), SwingSignal::Sell);
    assert!((paper.fetch_position(SYMBOL).await.unwrap() + 0.01).abs() < 1e-12);
}

#[tokio::test]
async fn test_test_mode_places_nothing() {
    let paper = paper_with(candles(90.0), 90.0).await;
    let swing = strategy(paper.clone(), true);

    assert_eq!(swing.run_iteration().await.unwrap(), SwingSignal::Buy);
    assert_eq!(paper.fetch_position(SYMBOL).await.unwrap(), 0.0);
    assert_eq!(
        paper.fetch_balance().await.unwrap().free_of("USDT"),
        10_000.0
    );
}

#[tokio::test]
async fn test_short_position_blocks_buy() {
    let paper = paper_with(candles(90.0), 90.0).await;
    paper.set_position(SYMBOL, -0.5).await;
    let swing = strategy(paper, false);

    assert_eq!(swing.run_iteration().await.unwrap(), SwingSignal::Hold);
}

#[tokio::test]
async fn test_flat_market_holds() {
    let paper = paper_with(candles(100.0), 100.0).await;
    let swing = strategy(paper, false);

    assert_eq!(swing.run_iteration().await.unwrap(), SwingSignal::Hold);
}

// =============================================================================
// Data problems
// =============================================================================

#[tokio::test]
async fn test_short_history_is_insufficient() {
    let history: Vec<Candle> = candles(100.0).into_iter().take(60).collect();
    let paper = paper_with(history, 100.0).await;
    let swing = strategy(paper, false);

    assert_eq!(
        swing.run_iteration().await.unwrap(),
        SwingSignal::InsufficientData
    );
}

#[tokio::test]
async fn test_fetch_failure_yields_no_candles() {
    let swing = strategy(Arc::new(PaperExchange::new()), false);

    assert!(swing.fetch_candles(None).await.is_empty());
    assert_eq!(
        swing.run_iteration().await.unwrap(),
        SwingSignal::InsufficientData
    );
}

#[tokio::test]
async fn test_invalid_candle_fails_the_iteration() {
    let mut history = candles(100.0);
    history[10].volume = -1.0;
    let paper = paper_with(history, 100.0).await;
    let swing = strategy(paper, false);

    assert!(swing.run_iteration().await.is_err());
}
