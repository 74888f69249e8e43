//! Average True Range (ATR).
//!
//! TR[t] = max(high-low, |high-prev_close|, |low-prev_close|), Wilder smoothed.
//! The first bar has no previous close and is excluded from the seed.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series. TR[0] = high - low.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    let Some(first) = bars.first() else {
        return tr;
    };
    tr[0] = first.high - first.low;

    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, bar) = (&pair[0], &pair[1]);
        tr[i + 1] = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());
    }
    tr
}

/// Wilder smoothing (alpha = 1/period).
///
/// Seed is the mean of the first `period` values after any leading NaNs.
/// A NaN inside the seed window or later ends the valid output.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 {
        return result;
    }
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    let seed_end = start + period;
    if seed_end > n {
        return result;
    }
    let window = &values[start..seed_end];
    if window.iter().any(|v| v.is_nan()) {
        return result;
    }

    let seed = window.iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }
    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // 10
            (102.0, 108.0, 100.0, 106.0), // max(8, 6, 2) = 8
            (106.0, 107.0, 98.0, 99.0),   // max(9, 1, 8) = 9
        ]);
        let tr = true_range(&bars);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[(98.0, 102.0, 97.0, 100.0), (110.0, 115.0, 108.0, 112.0)]);
        assert_approx(true_range(&bars)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0), // 8
            (106.0, 107.0, 98.0, 99.0),   // 9
            (99.0, 103.0, 97.0, 101.0),   // 6
            (101.0, 106.0, 100.0, 105.0), // 6
        ]);
        let result = Atr::new(3).compute(&bars);

        assert!(result[..3].iter().all(|v| v.is_nan()));
        // seed = mean(8, 9, 6); next = 6/3 + 2/3 * seed
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 14);
    }

    #[test]
    fn wilder_nan_inside_seed_is_all_nan() {
        let result = wilder_smooth(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
