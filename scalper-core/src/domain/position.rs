//! Position — the single open position owned by the lifecycle.

use super::order::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exposure as seen from outside the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

impl From<Side> for PositionSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => PositionSide::Long,
            Side::Short => PositionSide::Short,
        }
    }
}

/// Sub-flags of an open position. Each one only ever flips false → true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFlags {
    pub trailing_active: bool,
    pub partial_done: bool,
    pub breakeven_moved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    /// Remaining size after any partial exits.
    pub size: f64,
    pub initial_size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Price level of the partial-exit target at entry ATR.
    pub partial_target: f64,
    pub flags: PositionFlags,
    /// Highest close since entry for Long, lowest for Short.
    pub watermark: f64,
    pub entry_bar_index: usize,
    pub entry_time: DateTime<Utc>,
    /// ATR on the signal bar; anchors the initial stop and target.
    pub entry_atr: f64,
    /// Realized P&L of partial legs already closed.
    pub realized_pnl: f64,
    pub commission_paid: f64,
}

impl Position {
    /// Favorable price move from entry, in price units.
    pub fn favorable_move(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.side.sign()
    }

    /// Profit at `price` measured in ATR units. Zero when `atr` is not positive.
    pub fn profit_atr(&self, price: f64, atr: f64) -> f64 {
        if atr <= 0.0 {
            return 0.0;
        }
        self.favorable_move(price) / atr
    }

    /// Profit at the watermark, in ATR units.
    pub fn watermark_profit_atr(&self, atr: f64) -> f64 {
        self.profit_atr(self.watermark, atr)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.favorable_move(price) * self.size
    }

    /// Push the watermark in the favorable direction.
    pub fn update_watermark(&mut self, price: f64) {
        self.watermark = match self.side {
            Side::Long => self.watermark.max(price),
            Side::Short => self.watermark.min(price),
        };
    }

    /// True when `price` has crossed the stop against the position.
    pub fn stop_hit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }

    /// True when `price` has crossed the target in favor of the position.
    pub fn target_hit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price >= self.take_profit,
            Side::Short => price <= self.take_profit,
        }
    }
}
