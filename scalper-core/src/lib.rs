//! Scalper Core — single-instrument trading decision engine.
//!
//! This crate contains:
//! - Domain types (bars, intents, fills, positions, trade records)
//! - Typed strategy config with named presets and a one-time load pipeline
//! - Reference indicator bank producing per-bar snapshots with validity flags
//! - SignalEvaluator: preconditions and ordered entry rules, Long first
//! - RiskGovernor: daily loss/trade caps, loss streak and cooldown
//! - PositionSizer: fixed-fractional ATR sizing with a minimum-size fallback
//! - PositionLifecycle: single-position state machine with ratcheted stops
//! - TradeLedger: closed legs and per-date aggregates
//! - Engine: the per-bar loop and the execution-gateway seam
//! - Signed outbound trade notifications

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod ledger;
pub mod lifecycle;
pub mod notify;
pub mod risk;
pub mod signal;
pub mod sizer;

pub use config::{ConfigError, StrategyConfig, StrategyPreset};
pub use engine::{Engine, EngineOptions, ExecutionGateway, Submission};
pub use error::{EngineError, InvariantViolation};
