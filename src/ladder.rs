//! Symmetric price ladder with balance clamping
//!
//! For `n` levels and total spread `s` around mid-price `m`, rung `k`
//! (1-based) is a buy at `m * (1 - s*k/n)` and a sell at `m * (1 + s*k/n)`.
//! Every rung carries the same flat amount. When one side needs more than
//! the free balance covers, that whole side is scaled by
//! `available / required`; rungs left with a non-positive amount are not
//! submitted.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LadderError {
    #[error("order levels must be at least 1")]
    NoLevels,

    #[error("spread must be positive, got {0}")]
    NonPositiveSpread(f64),

    #[error("spread must be below 1.0 so every buy price stays positive, got {0}")]
    SpreadTooWide(f64),

    #[error("order amount must be non-negative, got {0}")]
    NegativeAmount(f64),
}

/// Inputs for one ladder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderParams {
    spread: f64,
    levels: usize,
    amount: f64,
}

impl LadderParams {
    pub fn new(spread: f64, levels: usize, amount: f64) -> Result<Self, LadderError> {
        if levels == 0 {
            return Err(LadderError::NoLevels);
        }
        if spread.is_nan() || spread <= 0.0 {
            return Err(LadderError::NonPositiveSpread(spread));
        }
        if spread >= 1.0 {
            return Err(LadderError::SpreadTooWide(spread));
        }
        if amount.is_nan() || amount < 0.0 {
            return Err(LadderError::NegativeAmount(amount));
        }
        Ok(Self {
            spread,
            levels,
            amount,
        })
    }

    pub fn spread(&self) -> f64 {
        self.spread
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Fractional distance between adjacent rungs
    pub fn spread_per_level(&self) -> f64 {
        self.spread / self.levels as f64
    }
}

/// One order of the ladder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rung {
    /// 1-based distance from mid, in levels
    pub level: usize,
    pub amount: f64,
    pub price: f64,
}

/// Scaling applied by [`Ladder::clamp_to_balances`]; `None` means untouched
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClampReport {
    pub buy_factor: Option<f64>,
    pub sell_factor: Option<f64>,
}

impl ClampReport {
    pub fn is_clamped(&self) -> bool {
        self.buy_factor.is_some() || self.sell_factor.is_some()
    }
}

/// Buy and sell rungs, nearest to mid first
#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    pub buys: Vec<Rung>,
    pub sells: Vec<Rung>,
}

pub fn build_ladder(mid_price: f64, params: &LadderParams) -> Ladder {
    let step = params.spread_per_level();
    let mut buys = Vec::with_capacity(params.levels);
    let mut sells = Vec::with_capacity(params.levels);

    for level in 1..=params.levels {
        let level_spread = step * level as f64;
        buys.push(Rung {
            level,
            amount: params.amount,
            price: mid_price * (1.0 - level_spread),
        });
        sells.push(Rung {
            level,
            amount: params.amount,
            price: mid_price * (1.0 + level_spread),
        });
    }

    Ladder { buys, sells }
}

fn scale(rungs: &mut [Rung], factor: f64) {
    for rung in rungs {
        rung.amount *= factor;
    }
}

impl Ladder {
    /// Quote currency needed for every buy rung
    pub fn required_quote(&self) -> f64 {
        self.buys.iter().map(|r| r.amount * r.price).sum()
    }

    /// Base currency needed for every sell rung
    pub fn required_base(&self) -> f64 {
        self.sells.iter().map(|r| r.amount).sum()
    }

    /// Scale each side down to what the free balances cover
    pub fn clamp_to_balances(&mut self, base_free: f64, quote_free: f64) -> ClampReport {
        let mut report = ClampReport::default();

        let required_quote = self.required_quote();
        if required_quote > quote_free {
            let factor = quote_free / required_quote;
            scale(&mut self.buys, factor);
            report.buy_factor = Some(factor);
        }

        let required_base = self.required_base();
        if required_base > base_free {
            let factor = base_free / required_base;
            scale(&mut self.sells, factor);
            report.sell_factor = Some(factor);
        }

        report
    }

    pub fn submittable_buys(&self) -> impl Iterator<Item = &Rung> {
        self.buys.iter().filter(|r| r.amount > 0.0)
    }

    pub fn submittable_sells(&self) -> impl Iterator<Item = &Rung> {
        self.sells.iter().filter(|r| r.amount > 0.0)
    }
}
