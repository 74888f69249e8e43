//! Order intents and their confirmations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for Long, -1 for Short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// What an intent does to the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Open,
    PartialClose,
    FullClose,
}

/// Why an intent was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Entry,
    Partial,
    Stop,
    Target,
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Entry => "entry",
            ExitReason::Partial => "partial",
            ExitReason::Stop => "stop",
            ExitReason::Target => "target",
            ExitReason::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// An instruction for the execution gateway.
///
/// `side` is the side of the position the intent acts on, not the
/// buy/sell direction of the order: closing a Long is a sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: Side,
    pub size: f64,
    pub kind: OrderKind,
    pub reason: ExitReason,
}

impl OrderIntent {
    pub fn open(side: Side, size: f64) -> Self {
        Self {
            side,
            size,
            kind: OrderKind::Open,
            reason: ExitReason::Entry,
        }
    }

    pub fn partial_close(side: Side, size: f64) -> Self {
        Self {
            side,
            size,
            kind: OrderKind::PartialClose,
            reason: ExitReason::Partial,
        }
    }

    pub fn full_close(side: Side, size: f64, reason: ExitReason) -> Self {
        Self {
            side,
            size,
            kind: OrderKind::FullClose,
            reason,
        }
    }

    /// True when the order buys: opening a Long or closing a Short.
    pub fn is_buy(&self) -> bool {
        match self.kind {
            OrderKind::Open => self.side == Side::Long,
            OrderKind::PartialClose | OrderKind::FullClose => self.side == Side::Short,
        }
    }
}

/// Confirmation that an intent executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub commission: f64,
}

/// Gateway refusal of an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
