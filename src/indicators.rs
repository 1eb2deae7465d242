//! Technical indicators via the `ta` crate
//!
//! Each series is aligned with its input; values are `None` until the
//! indicator's period has filled.

use ta::indicators::{BollingerBands, RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;

use crate::candles::closes;
use crate::types::Candle;

/// Band indicators (upper, middle, lower)
pub type BandOutput = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>);

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let sma_val = indicator.next(value);
            (i + 1 >= period).then_some(sma_val)
        })
        .collect()
}

/// Calculate Relative Strength Index
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match RelativeStrengthIndex::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    let mut result = Vec::with_capacity(values.len());
    for (i, &value) in values.iter().enumerate() {
        let rsi_val = indicator.next(value);
        if i + 1 >= period {
            result.push(Some(rsi_val));
        } else {
            result.push(None);
        }
    }
    result
}

/// Calculate Bollinger Bands
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> BandOutput {
    if values.is_empty() || period == 0 {
        return (vec![], vec![], vec![]);
    }

    let mut indicator = match BollingerBands::new(period, num_std) {
        Ok(i) => i,
        Err(_) => {
            return (
                vec![None; values.len()],
                vec![None; values.len()],
                vec![None; values.len()],
            )
        }
    };

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let bb = indicator.next(value);
        let ready = i + 1 >= period;
        upper.push(ready.then_some(bb.upper));
        middle.push(ready.then_some(bb.average));
        lower.push(ready.then_some(bb.lower));
    }

    (upper, middle, lower)
}

/// Periods for [`IndicatorFrame::compute`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSettings {
    pub sma_period: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std: f64,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            sma_period: 45,
            rsi_period: 14,
            bb_period: 20,
            bb_std: 2.0,
        }
    }
}

/// Candles with aligned indicator columns
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    pub candles: Vec<Candle>,
    pub sma: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub upper_band: Vec<Option<f64>>,
    pub middle_band: Vec<Option<f64>>,
    pub lower_band: Vec<Option<f64>>,
}

impl IndicatorFrame {
    pub fn compute(candles: Vec<Candle>, settings: &IndicatorSettings) -> Self {
        let close = closes(&candles);
        let (upper_band, middle_band, lower_band) =
            bollinger_bands(&close, settings.bb_period, settings.bb_std);

        Self {
            sma: sma(&close, settings.sma_period),
            rsi: rsi(&close, settings.rsi_period),
            upper_band,
            middle_band,
            lower_band,
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    pub fn last_sma(&self) -> Option<f64> {
        self.sma.last().copied().flatten()
    }

    pub fn last_rsi(&self) -> Option<f64> {
        self.rsi.last().copied().flatten()
    }
}
