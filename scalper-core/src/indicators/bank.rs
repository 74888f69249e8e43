//! IndicatorBank — precomputes every series once and serves per-bar snapshots.

use super::bollinger::{Bollinger, BollingerBand};
use super::cross::crossover;
use super::macd::macd_series;
use super::snapshot::{IndicatorId, IndicatorSnapshot};
use super::{Adx, Atr, Ema, Indicator, Rsi, Sma};
use crate::config::IndicatorParams;
use crate::domain::Bar;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct IndicatorBank {
    series: HashMap<IndicatorId, Vec<f64>>,
    len: usize,
}

impl IndicatorBank {
    /// Compute all series for `bars` with the configured periods.
    pub fn precompute(bars: &[Bar], params: &IndicatorParams) -> Self {
        let mut series = HashMap::new();

        let fast = Ema::new(params.fast_ema).compute(bars);
        let medium = Ema::new(params.medium_ema).compute(bars);
        let slow = Ema::new(params.slow_ema).compute(bars);
        series.insert(IndicatorId::EmaCross, crossover(&fast, &medium));
        series.insert(IndicatorId::EmaFast, fast);
        series.insert(IndicatorId::EmaMedium, medium);
        series.insert(IndicatorId::EmaSlow, slow);

        series.insert(IndicatorId::Rsi, Rsi::new(params.rsi_period).compute(bars));

        let (line, signal) =
            macd_series(bars, params.macd_fast, params.macd_slow, params.macd_signal);
        series.insert(IndicatorId::MacdCross, crossover(&line, &signal));
        series.insert(IndicatorId::MacdLine, line);
        series.insert(IndicatorId::MacdSignal, signal);

        for (id, band) in [
            (IndicatorId::BbUpper, BollingerBand::Upper),
            (IndicatorId::BbMiddle, BollingerBand::Middle),
            (IndicatorId::BbLower, BollingerBand::Lower),
        ] {
            let values = Bollinger::new(band, params.bb_period, params.bb_dev).compute(bars);
            series.insert(id, values);
        }

        series.insert(IndicatorId::Atr, Atr::new(params.atr_period).compute(bars));
        series.insert(IndicatorId::Adx, Adx::new(params.adx_period).compute(bars));
        series.insert(
            IndicatorId::VolumeMa,
            Sma::volume(params.volume_ma_period).compute(bars),
        );

        Self {
            series,
            len: bars.len(),
        }
    }

    /// Snapshot at `index`. Out-of-range indices yield an all-invalid snapshot.
    pub fn snapshot(&self, index: usize) -> IndicatorSnapshot {
        let mut snap = IndicatorSnapshot::new();
        for (&id, values) in &self.series {
            match values.get(index) {
                Some(&v) => snap.insert(id, v),
                None => snap.invalidate(id),
            }
        }
        snap
    }

    pub fn series(&self, id: IndicatorId) -> Option<&[f64]> {
        self.series.get(&id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
