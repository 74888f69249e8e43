//! ADX: Average Directional Index (Wilder).
//!
//! +DM/-DM and TR are Wilder smoothed, DX = 100 * |+DI - -DI| / (+DI + -DI),
//! and ADX is Wilder-smoothed DX. Lookback: 2 * period.

use super::atr::{true_range, wilder_smooth};
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        if n < 2 {
            return vec![f64::NAN; n];
        }

        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let up = bars[i].high - bars[i - 1].high;
            let down = bars[i - 1].low - bars[i].low;
            if up.is_nan() || down.is_nan() {
                continue;
            }
            plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        }

        let mut tr = true_range(bars);
        tr[0] = f64::NAN;
        let smooth_tr = wilder_smooth(&tr, self.period);
        let smooth_plus = wilder_smooth(&plus_dm, self.period);
        let smooth_minus = wilder_smooth(&minus_dm, self.period);

        let mut dx = vec![f64::NAN; n];
        for i in 0..n {
            let (str_, sp, sm) = (smooth_tr[i], smooth_plus[i], smooth_minus[i]);
            if str_.is_nan() || sp.is_nan() || sm.is_nan() || str_ == 0.0 {
                continue;
            }
            let plus_di = 100.0 * sp / str_;
            let minus_di = 100.0 * sm / str_;
            let di_sum = plus_di + minus_di;
            dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            };
        }

        wilder_smooth(&dx, self.period)
    }
}
