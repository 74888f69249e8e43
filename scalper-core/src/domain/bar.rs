//! Bar — one OHLCV sample for a fixed interval.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for the traded instrument.
///
/// Bars arrive in non-decreasing timestamp order. Volume is fractional
/// because crypto venues report base-asset volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Calendar date of the bar, used for daily risk rollover.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic sanity check: high bounds the body, low bounds the body, prices positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn date_is_utc_calendar_day() {
        let b = bar(1.0, 1.0, 1.0, 1.0);
        assert_eq!(b.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn sane_bar() {
        assert!(bar(100.0, 102.0, 99.0, 101.0).is_sane());
    }

    #[test]
    fn insane_bar_high_below_close() {
        assert!(!bar(100.0, 100.5, 99.0, 101.0).is_sane());
    }

    #[test]
    fn nan_bar_is_void() {
        let b = bar(100.0, f64::NAN, 99.0, 101.0);
        assert!(b.is_void());
        assert!(!b.is_sane());
    }
}
