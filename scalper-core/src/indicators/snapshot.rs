//! Per-bar indicator snapshot with a validity flag per value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Every value the engine may read from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorId {
    EmaFast,
    EmaMedium,
    EmaSlow,
    Rsi,
    MacdLine,
    MacdSignal,
    BbUpper,
    BbMiddle,
    BbLower,
    Atr,
    Adx,
    VolumeMa,
    /// Fast/medium EMA crossover flag: +1, -1 or 0.
    EmaCross,
    /// MACD line/signal crossover flag: +1, -1 or 0.
    MacdCross,
}

impl IndicatorId {
    pub const ALL: [IndicatorId; 14] = [
        IndicatorId::EmaFast,
        IndicatorId::EmaMedium,
        IndicatorId::EmaSlow,
        IndicatorId::Rsi,
        IndicatorId::MacdLine,
        IndicatorId::MacdSignal,
        IndicatorId::BbUpper,
        IndicatorId::BbMiddle,
        IndicatorId::BbLower,
        IndicatorId::Atr,
        IndicatorId::Adx,
        IndicatorId::VolumeMa,
        IndicatorId::EmaCross,
        IndicatorId::MacdCross,
    ];
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One indicator value and whether it may be used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub valid: bool,
}

impl Reading {
    /// Valid iff the value is finite.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            valid: value.is_finite(),
        }
    }

    pub fn invalid() -> Self {
        Self {
            value: f64::NAN,
            valid: false,
        }
    }

    pub fn get(self) -> Option<f64> {
        self.valid.then_some(self.value)
    }
}

/// Read-only view of all indicator values at one bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot {
    readings: HashMap<IndicatorId, Reading>,
}

impl IndicatorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, id: IndicatorId, value: f64) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: IndicatorId, value: f64) {
        self.readings.insert(id, Reading::new(value));
    }

    /// Force a reading invalid regardless of its value.
    pub fn invalidate(&mut self, id: IndicatorId) {
        self.readings.insert(id, Reading::invalid());
    }

    /// Missing ids read as invalid.
    pub fn reading(&self, id: IndicatorId) -> Reading {
        self.readings.get(&id).copied().unwrap_or_else(Reading::invalid)
    }

    pub fn get(&self, id: IndicatorId) -> Option<f64> {
        self.reading(id).get()
    }

    pub fn is_valid(&self, id: IndicatorId) -> bool {
        self.reading(id).valid
    }
}
