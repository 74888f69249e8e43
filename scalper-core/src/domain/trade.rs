//! TradeRecord — one realized leg of a position.

use super::order::{ExitReason, Side};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    Win,
    Loss,
}

impl TradeOutcome {
    /// Win iff P&L is strictly positive.
    pub fn from_pnl(pnl: f64) -> Self {
        if pnl > 0.0 {
            TradeOutcome::Win
        } else {
            TradeOutcome::Loss
        }
    }
}

/// Whether the record closed part of the position or the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeLeg {
    Partial,
    Final,
}

/// Appended on each partial or full close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub leg: TradeLeg,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Gross price P&L of this leg.
    pub pnl: f64,
    /// `pnl / (entry_price * size) * 100`.
    pub pnl_pct: f64,
    pub commission: f64,
    pub bars_held: usize,
    pub exit_reason: ExitReason,
    pub outcome: TradeOutcome,
}

impl TradeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        side: Side,
        leg: TradeLeg,
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
        entry_price: f64,
        exit_price: f64,
        size: f64,
        commission: f64,
        bars_held: usize,
        exit_reason: ExitReason,
    ) -> Self {
        let pnl = (exit_price - entry_price) * size * side.sign();
        let notional = entry_price * size;
        let pnl_pct = if notional == 0.0 {
            0.0
        } else {
            pnl / notional * 100.0
        };
        Self {
            side,
            leg,
            entry_time,
            exit_time,
            entry_price,
            exit_price,
            size,
            pnl,
            pnl_pct,
            commission,
            bars_held,
            exit_reason,
            outcome: TradeOutcome::from_pnl(pnl),
        }
    }

    pub fn duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration().num_seconds() as f64 / 60.0
    }

    pub fn net_pnl(&self) -> f64 {
        self.pnl - self.commission
    }

    pub fn is_winner(&self) -> bool {
        self.outcome == TradeOutcome::Win
    }
}
