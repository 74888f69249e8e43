//! Backtest runner — wires together indicators, engine, simulated fills and metrics.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use scalper_core::domain::{Bar, TradeRecord};
use scalper_core::engine::{EngineStats, EquityPoint};
use scalper_core::indicators::IndicatorBank;
use scalper_core::ledger::{DailyAggregate, LedgerSummary};
use scalper_core::risk::RiskState;
use scalper_core::{Engine, EngineError, EngineOptions, StrategyConfig};

use crate::gateway::{SimulatedGateway, DEFAULT_COMMISSION_RATE};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("no bars to run on")]
    NoData,
    #[error("failed to fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Run-level settings that are not strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub symbol: String,
    pub initial_equity: f64,
    /// Fraction of notional charged per fill.
    pub commission_rate: f64,
    /// Reject intents above this size.
    pub size_limit: Option<f64>,
    /// Close any open position on the last bar.
    pub flatten_at_end: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        let engine = EngineOptions::default();
        Self {
            symbol: engine.symbol,
            initial_equity: engine.initial_equity,
            commission_rate: DEFAULT_COMMISSION_RATE,
            size_limit: None,
            flatten_at_end: true,
        }
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Content hash of config, options and data range.
    pub run_id: String,
    pub config: StrategyConfig,
    pub options: RunOptions,
    pub start: String,
    pub end: String,
    pub bar_count: usize,
    pub final_equity: f64,
    pub metrics: PerformanceMetrics,
    pub summary: LedgerSummary,
    pub stats: EngineStats,
    pub risk: RiskState,
    pub notifications: usize,
    pub trades: Vec<TradeRecord>,
    pub daily: Vec<DailyAggregate>,
    pub equity_curve: Vec<EquityPoint>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run one backtest over pre-loaded bars. No I/O.
pub fn run_backtest(
    bars: &[Bar],
    config: &StrategyConfig,
    options: &RunOptions,
) -> Result<BacktestResult, RunError> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(RunError::NoData);
    };
    let run_id = run_id(config, options, bars)?;

    let bank = IndicatorBank::precompute(bars, &config.indicators);
    let mut engine = Engine::new(
        config,
        EngineOptions {
            symbol: options.symbol.clone(),
            initial_equity: options.initial_equity,
        },
    )?;
    let mut gateway = SimulatedGateway::new(options.commission_rate);
    if let Some(limit) = options.size_limit {
        gateway = gateway.with_size_limit(limit);
    }

    let mut notifications = 0;
    for (i, bar) in bars.iter().enumerate() {
        engine.step(&mut gateway, bar, &bank.snapshot(i))?;
        notifications += engine.drain_notifications().len();
    }
    if options.flatten_at_end && engine.flatten(&mut gateway, last)?.is_some() {
        debug!("open position closed at end of data");
        notifications += engine.drain_notifications().len();
    }

    let curve: Vec<f64> = engine.equity_curve().iter().map(|p| p.equity).collect();
    let trades = engine.ledger().records().to_vec();
    let metrics = PerformanceMetrics::compute(&curve, &trades);
    let final_equity = engine
        .account()
        .equity(engine.lifecycle().position(), last.close);

    info!(
        run_id = %run_id,
        preset = config.preset.name(),
        bars = bars.len(),
        trades = trades.len(),
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        options: options.clone(),
        start: first.timestamp.to_rfc3339(),
        end: last.timestamp.to_rfc3339(),
        bar_count: bars.len(),
        final_equity,
        metrics,
        summary: engine.ledger().summary(),
        stats: engine.stats().clone(),
        risk: engine.risk_state().clone(),
        notifications,
        trades,
        daily: engine.ledger().daily().cloned().collect(),
        equity_curve: engine.equity_curve().to_vec(),
    })
}

/// Deterministic id: BLAKE3 over the resolved config, the run options and
/// the data's extent. First 16 hex characters.
pub fn run_id(
    config: &StrategyConfig,
    options: &RunOptions,
    bars: &[Bar],
) -> Result<String, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(config)?);
    hasher.update(&serde_json::to_vec(options)?);
    hasher.update(&(bars.len() as u64).to_le_bytes());
    for bar in [bars.first(), bars.last()].into_iter().flatten() {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
    }
    let hex = hasher.finalize().to_hex();
    Ok(hex.as_str()[..16].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{generate_bars, SyntheticConfig};
    use scalper_core::StrategyPreset;

    fn bars() -> Vec<Bar> {
        generate_bars(&SyntheticConfig {
            days: 2,
            seed: 5,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn empty_data_is_an_error() {
        let config = StrategyPreset::HighRoi.to_config();
        assert!(matches!(
            run_backtest(&[], &config, &RunOptions::default()),
            Err(RunError::NoData)
        ));
    }

    #[test]
    fn run_id_is_deterministic_and_config_sensitive() {
        let bars = bars();
        let config = StrategyPreset::HighRoi.to_config();
        let options = RunOptions::default();
        let a = run_id(&config, &options, &bars).unwrap();
        assert_eq!(a.len(), 16);
        assert_eq!(a, run_id(&config, &options, &bars).unwrap());

        let mut tweaked = config.clone();
        tweaked.exits.atr_stop_multiplier = 2.0;
        assert_ne!(a, run_id(&tweaked, &options, &bars).unwrap());
    }

    #[test]
    fn run_ends_flat_with_consistent_accounting() {
        let bars = bars();
        let config = StrategyPreset::HighRoi.to_config();
        let result = run_backtest(&bars, &config, &RunOptions::default()).unwrap();

        assert_eq!(result.bar_count, bars.len());
        assert_eq!(result.equity_curve.len(), bars.len());
        assert_eq!(result.stats.bars, bars.len());

        let net: f64 = result.trades.iter().map(|t| t.net_pnl()).sum();
        assert!((result.final_equity - (10_000.0 + net)).abs() < 1e-6);
        let entries: u32 = result.daily.iter().map(|d| d.entries).sum();
        assert_eq!(entries as usize, result.summary.round_trips);
    }
}
