//! Market tick and lot alignment
//!
//! Exchanges reject orders whose price is off the market's tick or whose
//! quantity is off its lot step. Prices round to the nearest tick and
//! quantities round down to the step, in decimal arithmetic, before an
//! adapter renders them onto the wire.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::{ExchangeError, ExchangeResult};

/// Digits kept when a market reports no increment
const FALLBACK_DECIMALS: u32 = 8;

/// Largest scale a `Decimal` can carry
const MAX_SCALE: u32 = 28;

/// Price tick and quantity step of one market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketPrecision {
    tick_size: Decimal,
    step_size: Decimal,
}

impl MarketPrecision {
    pub fn new(tick_size: Decimal, step_size: Decimal) -> Self {
        Self {
            tick_size,
            step_size,
        }
    }

    /// Parse increments as exchanges send them (`"0.01000000"`)
    pub fn from_strs(tick_size: &str, step_size: &str) -> ExchangeResult<Self> {
        let tick = Decimal::from_str(tick_size.trim())
            .map_err(|_| ExchangeError::parse("tickSize", tick_size))?;
        let step = Decimal::from_str(step_size.trim())
            .map_err(|_| ExchangeError::parse("stepSize", step_size))?;
        Ok(Self::new(tick, step))
    }

    /// Increments given as a number of decimal places
    pub fn from_decimals(price_decimals: u32, amount_decimals: u32) -> Self {
        Self::new(
            Decimal::new(1, price_decimals.min(MAX_SCALE)),
            Decimal::new(1, amount_decimals.min(MAX_SCALE)),
        )
    }

    pub fn tick_size(&self) -> Decimal {
        self.tick_size
    }

    pub fn step_size(&self) -> Decimal {
        self.step_size
    }

    /// Nearest tick
    pub fn align_price(&self, price: f64) -> ExchangeResult<Decimal> {
        let value = to_decimal("price", price)?;
        Ok(align(
            value,
            self.tick_size,
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// Down to the lot step; a quantity below one step is an error
    pub fn align_amount(&self, amount: f64) -> ExchangeResult<Decimal> {
        let value = to_decimal("amount", amount)?;
        let aligned = align(value, self.step_size, RoundingStrategy::ToZero);
        if aligned <= Decimal::ZERO {
            return Err(ExchangeError::BelowLotStep {
                amount,
                step: self.step_size.normalize().to_string(),
            });
        }
        Ok(aligned)
    }

    pub fn format_price(&self, price: f64) -> ExchangeResult<String> {
        Ok(self.align_price(price)?.to_string())
    }

    pub fn format_amount(&self, amount: f64) -> ExchangeResult<String> {
        Ok(self.align_amount(amount)?.to_string())
    }
}

fn to_decimal(field: &'static str, value: f64) -> ExchangeResult<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| ExchangeError::parse(field, value.to_string()))
}

fn align(value: Decimal, increment: Decimal, strategy: RoundingStrategy) -> Decimal {
    if increment <= Decimal::ZERO {
        return value
            .round_dp_with_strategy(FALLBACK_DECIMALS, strategy)
            .normalize();
    }
    let steps = (value / increment).round_dp_with_strategy(0, strategy);
    (steps * increment).normalize()
}

/// Back to a float for JSON bodies that carry numbers
pub(crate) fn to_f64(value: Decimal) -> ExchangeResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| ExchangeError::parse("decimal", value.to_string()))
}

/// Per-adapter cache of market increments, shared by clones
#[derive(Debug, Clone, Default)]
pub(crate) struct PrecisionCache {
    markets: Arc<Mutex<HashMap<String, MarketPrecision>>>,
}

impl PrecisionCache {
    /// Cached increments for `market_id`, loading them once with `load`
    ///
    /// `load` may return several markets; all of them are kept.
    pub(crate) async fn get_or_load<F, Fut>(
        &self,
        market_id: &str,
        load: F,
    ) -> ExchangeResult<MarketPrecision>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ExchangeResult<Vec<(String, MarketPrecision)>>>,
    {
        let mut markets = self.markets.lock().await;
        if let Some(precision) = markets.get(market_id) {
            return Ok(*precision);
        }

        markets.extend(load().await?);
        markets
            .get(market_id)
            .copied()
            .ok_or_else(|| ExchangeError::UnknownMarket(market_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn precision() -> MarketPrecision {
        MarketPrecision::from_strs("0.01000000", "0.00100000").unwrap()
    }

    #[test]
    fn test_price_rounds_to_nearest_tick() {
        let p = precision();
        assert_eq!(p.align_price(99.333333333).unwrap(), dec!(99.33));
        assert_eq!(p.align_price(98.666666667).unwrap(), dec!(98.67));
        assert_eq!(p.format_price(101.0).unwrap(), "101");
    }

    #[test]
    fn test_amount_rounds_down_to_step() {
        let p = precision();
        assert_eq!(p.align_amount(0.123456789).unwrap(), dec!(0.123));
        assert_eq!(p.align_amount(0.1239).unwrap(), dec!(0.123));
        assert_eq!(p.format_amount(1.5).unwrap(), "1.5");
    }

    #[test]
    fn test_amount_below_step_is_rejected() {
        let err = precision().align_amount(0.0004).unwrap_err();
        assert!(matches!(err, ExchangeError::BelowLotStep { .. }));
    }

    #[test]
    fn test_coarse_ticks() {
        let p = MarketPrecision::new(dec!(0.5), dec!(10));
        assert_eq!(p.align_price(100.74).unwrap(), dec!(100.5));
        assert_eq!(p.align_price(100.76).unwrap(), dec!(101));
        assert_eq!(p.align_amount(129.0).unwrap(), dec!(120));
    }

    #[test]
    fn test_zero_increment_keeps_eight_decimals() {
        let p = MarketPrecision::new(Decimal::ZERO, Decimal::ZERO);
        assert_eq!(p.format_price(2.5380710659).unwrap(), "2.53807107");
    }

    #[test]
    fn test_from_decimals() {
        let p = MarketPrecision::from_decimals(2, 5);
        assert_eq!(p.tick_size(), dec!(0.01));
        assert_eq!(p.step_size(), dec!(0.00001));
    }

    #[tokio::test]
    async fn test_cache_loads_once() {
        let cache = PrecisionCache::default();
        let loaded = cache
            .get_or_load("BTCUSDT", || async {
                Ok::<_, ExchangeError>(vec![
                    ("BTCUSDT".to_string(), precision()),
                    ("ETHUSDT".to_string(), MarketPrecision::from_decimals(1, 4)),
                ])
            })
            .await
            .unwrap();
        assert_eq!(loaded, precision());

        let cached = cache
            .get_or_load("ETHUSDT", || async {
                Err::<Vec<(String, MarketPrecision)>, _>(ExchangeError::UnknownMarket(
                    "reloaded".to_string(),
                ))
            })
            .await
            .unwrap();
        assert_eq!(cached.tick_size(), dec!(0.1));

        let missing = cache
            .get_or_load("DOGEUSDT", || async { Ok::<_, ExchangeError>(Vec::new()) })
            .await;
        assert!(matches!(missing, Err(ExchangeError::UnknownMarket(_))));
    }
}
