//! Bollinger Bands: SMA(close) ± multiplier × population stddev.
//!
//! Each band is a separate indicator instance. Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(band: BollingerBand, period: usize, multiplier: f64) -> Self {
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period: period.max(1),
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        for (offset, window) in bars.windows(self.period).enumerate() {
            if window.iter().any(|b| b.close.is_nan()) {
                continue;
            }
            let mean = window.iter().map(|b| b.close).sum::<f64>() / self.period as f64;
            let value = match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper | BollingerBand::Lower => {
                    let variance = window
                        .iter()
                        .map(|b| (b.close - mean).powi(2))
                        .sum::<f64>()
                        / self.period as f64;
                    let width = self.multiplier * variance.sqrt();
                    if self.band == BollingerBand::Upper {
                        mean + width
                    } else {
                        mean - width
                    }
                }
            };
            result[offset + self.period - 1] = value;
        }

        result
    }
}
