//! Cash bookkeeping for the single instrument.

use crate::domain::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub starting_equity: f64,
    pub realized_pnl: f64,
    pub commission: f64,
}

impl Account {
    pub fn new(starting_equity: f64) -> Self {
        Self {
            starting_equity,
            realized_pnl: 0.0,
            commission: 0.0,
        }
    }

    /// Equity with no open exposure.
    pub fn balance(&self) -> f64 {
        self.starting_equity + self.realized_pnl - self.commission
    }

    /// Mark-to-market equity at `price`.
    pub fn equity(&self, position: Option<&Position>, price: f64) -> f64 {
        self.balance() + position.map(|p| p.unrealized_pnl(price)).unwrap_or(0.0)
    }
}

/// One equity-curve sample, taken at each bar's close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}
