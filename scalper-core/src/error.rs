//! Engine errors.
//!
//! Data conditions (missing indicators, vetoes, rejections) never surface
//! here; they degrade to "no signal" or "no intent". What remains are
//! defects in the surrounding system that must not be masked.

use crate::domain::OrderKind;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A broken engine invariant. Fatal for the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("fill arrived with no outstanding intent")]
    UnexpectedFill,

    #[error("rejection arrived with no outstanding intent")]
    UnexpectedRejection,

    #[error("new {requested:?} intent while another is outstanding")]
    IntentOutstanding { requested: OrderKind },

    #[error("entry requested while a position is open")]
    PositionOpen,

    #[error("close requested with no open position")]
    NoOpenPosition,

    #[error("fill size {filled} exceeds remaining position size {remaining}")]
    Overfill { filled: f64, remaining: f64 },

    #[error("fill has non-positive size {0}")]
    EmptyFill(f64),

    #[error("bar at {bar} precedes previous bar at {previous}")]
    OutOfOrderBar {
        previous: DateTime<Utc>,
        bar: DateTime<Utc>,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}
