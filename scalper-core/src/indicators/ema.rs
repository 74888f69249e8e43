//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1]
//! Seed: SMA of the first `period` values after any leading NaNs.
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.period)
    }
}

/// EMA of an arbitrary series.
///
/// Leading NaNs are skipped so derived series (MACD line) can be smoothed.
/// A NaN inside the seed window yields an all-NaN result; a NaN after the
/// seed taints everything that follows.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 {
        return result;
    }
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    if n - start < period {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    let mut sum = 0.0;
    for &v in &values[start..start + period] {
        if v.is_nan() {
            return result;
        }
        sum += v;
    }
    let seed = sum / period as f64;
    let seed_index = start + period - 1;
    result[seed_index] = seed;

    let mut prev = seed;
    for i in (seed_index + 1)..n {
        if values[i].is_nan() {
            return result;
        }
        let ema = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = ema;
        prev = ema;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_close() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Ema::new(1).compute(&bars);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5, seed at index 2 = SMA(10,11,12) = 11
        // EMA[3] = 0.5*13 + 0.5*11 = 12, EMA[4] = 0.5*14 + 0.5*12 = 13
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Ema::new(3).compute(&bars);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[3], 12.0, DEFAULT_EPSILON);
        assert_approx(result[4], 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_nan_in_seed_produces_all_nan() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        bars[1].close = f64::NAN;
        let result = Ema::new(3).compute(&bars);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn ema_nan_after_seed_propagates() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        bars[3].close = f64::NAN;
        let result = Ema::new(3).compute(&bars);
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert!(result[3].is_nan());
        assert!(result[4].is_nan());
    }

    #[test]
    fn ema_of_series_skips_leading_nan() {
        let values = [f64::NAN, f64::NAN, 2.0, 4.0, 6.0, 8.0];
        let result = ema_of_series(&values, 2);
        assert!(result[2].is_nan());
        assert_approx(result[3], 3.0, DEFAULT_EPSILON);
        // alpha = 2/3: 2/3*6 + 1/3*3 = 5
        assert_approx(result[4], 5.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_lookback() {
        assert_eq!(Ema::new(21).lookback(), 20);
        assert_eq!(Ema::new(1).lookback(), 0);
    }
}
