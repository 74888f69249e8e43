//! Indicator mathematics and the per-bar snapshot the engine reads.
//!
//! Every indicator implements [`Indicator`]: a full bar series in, a numeric
//! series of the same length out. Series are precomputed once by
//! [`IndicatorBank`] and served per bar as an [`IndicatorSnapshot`], where
//! each value carries a validity flag. Warm-up values are NaN and read as
//! invalid.

pub mod adx;
pub mod atr;
pub mod bank;
pub mod bollinger;
pub mod cross;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod snapshot;

pub use adx::Adx;
pub use atr::Atr;
pub use bank::IndicatorBank;
pub use bollinger::{Bollinger, BollingerBand};
pub use cross::crossover;
pub use ema::Ema;
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;
pub use sma::{PriceSource, Sma};
pub use snapshot::{IndicatorId, IndicatorSnapshot, Reading};

use crate::domain::Bar;

/// Trait for indicators.
///
/// The first `lookback()` values of `compute` are `f64::NAN`. No value at
/// bar t may depend on data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_21", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Create synthetic one-minute bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: start + chrono::Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
