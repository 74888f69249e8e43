//! Simple Moving Average (SMA) of close or volume.
//!
//! Lookback: period - 1. A NaN anywhere in the window yields NaN.

use super::Indicator;
use crate::domain::Bar;

/// Which bar field an SMA averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Close,
    Volume,
}

impl PriceSource {
    fn extract(self, bar: &Bar) -> f64 {
        match self {
            PriceSource::Close => bar.close,
            PriceSource::Volume => bar.volume,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: PriceSource,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            source: PriceSource::Close,
            name: format!("sma_{period}"),
        }
    }

    /// Moving average of volume.
    pub fn volume(period: usize) -> Self {
        Self {
            period: period.max(1),
            source: PriceSource::Volume,
            name: format!("volume_sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values: Vec<f64> = bars.iter().map(|b| self.source.extract(b)).collect();
        sma_of_series(&values, self.period)
    }
}

/// Rolling mean over `period` values.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for (offset, window) in values.windows(period).enumerate() {
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[offset + period - 1] = window.iter().sum::<f64>() / period as f64;
    }
    result
}
