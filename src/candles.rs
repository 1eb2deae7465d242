//! OHLCV resampling into coarser buckets

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::types::Candle;

/// Midnight UTC of the day containing `ts`
fn start_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(ts)
}

/// Aggregate candles into fixed-width buckets
///
/// Buckets are anchored at midnight UTC of the earliest candle's day, so a
/// 45-minute width yields 00:00, 00:45, 01:30, ... Each bucket is stamped
/// with its start time and aggregates open=first, high=max, low=min,
/// close=last, volume=sum. Buckets with no candles are dropped. A
/// non-positive width returns the input unchanged.
pub fn resample(candles: &[Candle], width: Duration) -> Vec<Candle> {
    let width_ms = width.num_milliseconds();
    if width_ms <= 0 || candles.is_empty() {
        return candles.to_vec();
    }

    let mut sorted: Vec<&Candle> = candles.iter().collect();
    sorted.sort_by_key(|c| c.datetime);

    let anchor = start_of_day(sorted[0].datetime);
    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();

    for candle in sorted {
        let offset = (candle.datetime - anchor).num_milliseconds();
        let index = offset.div_euclid(width_ms);

        buckets
            .entry(index)
            .and_modify(|bucket| {
                bucket.high = bucket.high.max(candle.high);
                bucket.low = bucket.low.min(candle.low);
                bucket.close = candle.close;
                bucket.volume += candle.volume;
            })
            .or_insert_with(|| Candle {
                datetime: anchor + Duration::milliseconds(index * width_ms),
                ..candle.clone()
            });
    }

    buckets.into_values().collect()
}

/// Closing prices, oldest first
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
