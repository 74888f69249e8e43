//! MACD: EMA(fast) - EMA(slow), with an EMA(signal) of that line.
//!
//! Lookback: slow - 1 for the line, slow + signal - 2 for the signal.

use super::ema::ema_of_series;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(line: MacdLine, fast: usize, slow: usize, signal: usize) -> Self {
        let label = match line {
            MacdLine::Macd => "line",
            MacdLine::Signal => "signal",
        };
        Self {
            fast: fast.max(1),
            slow: slow.max(1),
            signal: signal.max(1),
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }
}

/// Compute the MACD line and its signal line together.
pub fn macd_series(bars: &[Bar], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let fast_ema = ema_of_series(&closes, fast);
    let slow_ema = ema_of_series(&closes, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&line, signal);
    (line, signal_line)
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let line = self.fast.max(self.slow) - 1;
        match self.line {
            MacdLine::Macd => line,
            MacdLine::Signal => line + self.signal - 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (line, signal) = macd_series(bars, self.fast, self.slow, self.signal);
        match self.line {
            MacdLine::Macd => line,
            MacdLine::Signal => signal,
        }
    }
}
