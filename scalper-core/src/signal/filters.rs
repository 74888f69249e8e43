//! Entry filters.
//!
//! Each check consults the validity flag of every value it reads. When a
//! value is unusable the check falls back to a fixed polarity, noted on the
//! function: most checks fail closed, the session clock check cannot fail.

use crate::config::SessionParams;
use crate::domain::{Bar, Side};
use crate::indicators::{IndicatorId, IndicatorSnapshot};
use chrono::{DateTime, Timelike, Utc};

/// Allowed-hours, low-volume-hours and minute-of-hour windows.
///
/// The session window runs from `HH:00:00` of the start hour up to and
/// including `HH:00:00` of the end hour, and may wrap midnight.
pub fn in_session(time: DateTime<Utc>, session: &SessionParams) -> bool {
    let hour = time.hour();
    let minute = time.minute();

    if session.avoid_low_volume_hours
        && hour_in_window(
            hour,
            session.low_volume_start_hour,
            session.low_volume_end_hour,
        )
    {
        return false;
    }

    if !session.trade_24_7 {
        let now = time.num_seconds_from_midnight();
        let start = session.session_start_hour * 3600;
        let end = session.session_end_hour * 3600;
        let within = if start <= end {
            start <= now && now <= end
        } else {
            now >= start || now <= end
        };
        if !within {
            return false;
        }
    }

    if minute < session.avoid_first_minutes {
        return false;
    }
    if session.avoid_last_minutes > 0 && minute >= 60 - session.avoid_last_minutes {
        return false;
    }
    true
}

/// `start <= hour < end`, wrapping midnight when `start > end`.
fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// |fast EMA - slow EMA| / close ≥ threshold. Fails on invalid EMAs or zero price.
pub fn trend_strength(bar: &Bar, snap: &IndicatorSnapshot, min_strength: f64) -> bool {
    let (Some(fast), Some(slow)) = (snap.get(IndicatorId::EmaFast), snap.get(IndicatorId::EmaSlow))
    else {
        return false;
    };
    if bar.close <= 0.0 {
        return false;
    }
    (fast - slow).abs() / bar.close >= min_strength
}

/// volume ≥ average × multiplier. Fails on an invalid or non-positive average.
pub fn volume_surge(bar: &Bar, snap: &IndicatorSnapshot, multiplier: f64) -> bool {
    match snap.get(IndicatorId::VolumeMa) {
        Some(avg) if avg > 0.0 => bar.volume / avg >= multiplier,
        _ => false,
    }
}

/// ADX ≥ threshold. Fails on invalid ADX.
pub fn adx_strong(snap: &IndicatorSnapshot, threshold: f64) -> bool {
    snap.get(IndicatorId::Adx)
        .map(|adx| adx >= threshold)
        .unwrap_or(false)
}

/// MACD line on the trade's side of its signal line, and optionally of zero.
/// Fails on invalid MACD.
pub fn macd_agrees(snap: &IndicatorSnapshot, side: Side, zero_line: bool) -> bool {
    let (Some(line), Some(signal)) = (
        snap.get(IndicatorId::MacdLine),
        snap.get(IndicatorId::MacdSignal),
    ) else {
        return false;
    };
    match side {
        Side::Long => line > signal && (!zero_line || line > 0.0),
        Side::Short => line < signal && (!zero_line || line < 0.0),
    }
}

/// Close between the outer band and the middle band on the entry side:
/// lower ≤ close ≤ middle for Long, middle ≤ close ≤ upper for Short.
/// Fails on invalid bands.
pub fn bb_pullback(bar: &Bar, snap: &IndicatorSnapshot, side: Side) -> bool {
    let Some(middle) = snap.get(IndicatorId::BbMiddle) else {
        return false;
    };
    match side {
        Side::Long => snap
            .get(IndicatorId::BbLower)
            .map(|lower| lower <= bar.close && bar.close <= middle)
            .unwrap_or(false),
        Side::Short => snap
            .get(IndicatorId::BbUpper)
            .map(|upper| middle <= bar.close && bar.close <= upper)
            .unwrap_or(false),
    }
}
