//! Position sizer — risk budget and ATR stop distance → order quantity.

use crate::config::{ExitParams, RiskParams};
use crate::domain::{round_to, MIN_ORDER_SIZE};
use tracing::debug;

/// ATR-based fixed-fractional sizer.
///
/// # Formula
/// ```text
/// risk_amount   = equity * risk_per_trade_pct / 100
/// stop_distance = ATR * atr_stop_multiplier
/// size          = clamp(round(risk_amount / stop_distance, precision), 0.01, max_position_size)
/// ```
///
/// # Example
/// - Equity: 10,000, risk 1% → 100
/// - ATR 0.5, stop 1.5× → 0.75
/// - Raw size 133.33, max 2.0 → **2.0**
///
/// When ATR is unusable, equity is not positive or the stop distance is not
/// positive, the sizer returns the minimum order size instead of failing.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_per_trade_pct: f64,
    atr_stop_multiplier: f64,
    max_position_size: f64,
    precision: u32,
}

impl PositionSizer {
    pub fn new(risk: &RiskParams, exits: &ExitParams) -> Self {
        Self {
            risk_per_trade_pct: risk.risk_per_trade_pct,
            atr_stop_multiplier: exits.atr_stop_multiplier,
            max_position_size: risk.max_position_size,
            precision: risk.size_precision,
        }
    }

    /// `atr` is `None` when the indicator reading is invalid.
    pub fn size(&self, equity: f64, atr: Option<f64>) -> f64 {
        let Some(atr) = atr.filter(|a| a.is_finite() && *a > 0.0) else {
            debug!("ATR unusable, sizing at minimum");
            return MIN_ORDER_SIZE;
        };
        if equity.is_nan() || equity <= 0.0 {
            return MIN_ORDER_SIZE;
        }
        let stop_distance = atr * self.atr_stop_multiplier;
        if stop_distance <= 0.0 {
            return MIN_ORDER_SIZE;
        }

        let risk_amount = equity * (self.risk_per_trade_pct / 100.0);
        let raw = round_to(risk_amount / stop_distance, self.precision);
        raw.clamp(MIN_ORDER_SIZE, self.max_position_size.max(MIN_ORDER_SIZE))
    }

    /// Round a derived quantity (e.g. a partial exit) to the sizing precision.
    pub fn round(&self, quantity: f64) -> f64 {
        round_to(quantity, self.precision)
    }
}
