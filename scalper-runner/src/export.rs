//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Persisted JSON carries a `schema_version`; newer versions than this
//! build understands are rejected on load.

use std::path::{Path, PathBuf};

use scalper_core::domain::TradeRecord;
use scalper_core::engine::EquityPoint;
use thiserror::Error;
use tracing::info;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepReport;

/// Errors from artifact export and import.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported schema version {found} (max supported: {supported})")]
    Schema { found: u32, supported: u32 },
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::Schema {
            found: result.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per ledger leg.
///
/// Columns: side, leg, entry_time, exit_time, entry_price, exit_price, size,
/// pnl, pnl_pct, commission, net_pnl, bars_held, exit_reason, outcome
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "leg",
        "entry_time",
        "exit_time",
        "entry_price",
        "exit_price",
        "size",
        "pnl",
        "pnl_pct",
        "commission",
        "net_pnl",
        "bars_held",
        "exit_reason",
        "outcome",
    ])?;

    for t in trades {
        wtr.write_record([
            t.side.to_string(),
            format!("{:?}", t.leg).to_lowercase(),
            t.entry_time.to_rfc3339(),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            format!("{:.6}", t.exit_price),
            format!("{:.8}", t.size),
            format!("{:.4}", t.pnl),
            format!("{:.4}", t.pnl_pct),
            format!("{:.4}", t.commission),
            format!("{:.4}", t.net_pnl()),
            t.bars_held.to_string(),
            t.exit_reason.to_string(),
            format!("{:?}", t.outcome).to_lowercase(),
        ])?;
    }

    into_string(wtr)
}

/// Columns: timestamp, equity.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for p in equity_curve {
        wtr.write_record([p.timestamp.to_rfc3339(), format!("{:.2}", p.equity)])?;
    }
    into_string(wtr)
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))?;
    // every field written above is already UTF-8
    Ok(String::from_utf8_lossy(&data).into_owned())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one run under `output_dir/<run_id>/`:
/// - `summary.json`: the full `BacktestResult`
/// - `trades.csv`: ledger legs
/// - `equity.csv`: per-bar equity
///
/// Re-running the same config over the same data overwrites the same
/// directory. Returns the directory path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let run_dir = output_dir.join(&result.run_id);
    std::fs::create_dir_all(&run_dir).map_err(|source| ExportError::Io {
        path: run_dir.clone(),
        source,
    })?;

    write(&run_dir.join("summary.json"), &export_json(result)?)?;
    write(
        &run_dir.join("trades.csv"),
        &export_trades_csv(&result.trades)?,
    )?;
    write(
        &run_dir.join("equity.csv"),
        &export_equity_csv(&result.equity_curve)?,
    )?;

    info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult, ExportError> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path).map_err(|source| ExportError::Io { path, source })?;
    import_json(&json)
}

/// Write a sweep report as pretty JSON.
pub fn save_sweep_report(report: &SweepReport, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write(path, &serde_json::to_string_pretty(report)?)
}

fn write(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Markdown report ────────────────────────────────────────────────

/// Human-readable single-run report.
pub fn generate_report(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let s = &result.summary;
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");
    md.push_str("| Field | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", result.run_id));
    md.push_str(&format!("| Symbol | {} |\n", result.options.symbol));
    md.push_str(&format!("| Preset | {} |\n", result.config.preset.name()));
    md.push_str(&format!("| Period | {} to {} |\n", result.start, result.end));
    md.push_str(&format!("| Bars | {} |\n", result.bar_count));
    md.push_str(&format!(
        "| Initial Equity | {:.2} |\n",
        result.options.initial_equity
    ));
    md.push_str(&format!("| Final Equity | {:.2} |\n\n", result.final_equity));

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Round Trips | {} |\n", m.round_trips));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!(
        "| Longest Streaks | {} wins / {} losses |\n\n",
        m.max_consecutive_wins, m.max_consecutive_losses
    ));

    md.push_str("## Ledger\n\n");
    md.push_str("| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Legs | {} |\n", s.trades));
    md.push_str(&format!("| Avg Win | {:.2} |\n", s.avg_win));
    md.push_str(&format!("| Avg Loss | {:.2} |\n", s.avg_loss));
    md.push_str(&format!(
        "| Avg Duration | {:.1} min |\n",
        s.avg_duration_minutes
    ));
    md.push_str(&format!("| Commission | {:.2} |\n", s.total_commission));
    md.push_str(&format!("| Signals | {} |\n", result.stats.signals));
    md.push_str(&format!("| Vetoed Bars | {} |\n", result.stats.vetoed_bars));
    md.push_str(&format!("| Rejections | {} |\n\n", result.stats.rejections));

    if !result.daily.is_empty() {
        md.push_str("## Daily\n\n");
        md.push_str("| Date | Entries | Closes | Wins | Losses | P&L |\n");
        md.push_str("| --- | --- | --- | --- | --- | --- |\n");
        for d in &result.daily {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {:.2} |\n",
                d.date, d.entries, d.closes, d.wins, d.losses, d.realized_pnl
            ));
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{run_backtest, RunOptions};
    use crate::synthetic::{generate_bars, SyntheticConfig};
    use chrono::{TimeZone, Utc};
    use scalper_core::domain::{ExitReason, Side, TradeLeg};
    use scalper_core::StrategyPreset;

    fn result() -> BacktestResult {
        let bars = generate_bars(&SyntheticConfig {
            days: 1,
            seed: 21,
            ..SyntheticConfig::default()
        });
        run_backtest(
            &bars,
            &StrategyPreset::HighRoi.to_config(),
            &RunOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn json_round_trip_preserves_result() {
        let r = result();
        let back = import_json(&export_json(&r).unwrap()).unwrap();
        assert_eq!(back.run_id, r.run_id);
        assert_eq!(back.trades.len(), r.trades.len());
        assert_eq!(back.config, r.config);
        assert_eq!(back.equity_curve.len(), r.equity_curve.len());
        assert!((back.final_equity - r.final_equity).abs() < 1e-9);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut value = serde_json::to_value(result()).unwrap();
        value["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
        let err = import_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ExportError::Schema { .. }));
    }

    #[test]
    fn missing_schema_defaults_to_current() {
        let mut value = serde_json::to_value(result()).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let back = import_json(&value.to_string()).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn trades_csv_columns() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let record = TradeRecord::new(
            Side::Short,
            TradeLeg::Partial,
            t,
            t + chrono::Duration::minutes(5),
            100.0,
            98.0,
            0.5,
            0.06,
            5,
            ExitReason::Partial,
        );
        let csv = export_trades_csv(&[record]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("side,leg,entry_time"));
        let row = lines.next().unwrap();
        assert!(row.contains(",partial,"));
        assert!(row.contains(",1.0000,"), "pnl column: {row}");
        assert!(row.ends_with(",win"));
    }

    #[test]
    fn equity_csv_has_one_row_per_point() {
        let r = result();
        let csv = export_equity_csv(&r.equity_curve).unwrap();
        assert_eq!(csv.lines().count(), r.equity_curve.len() + 1);
    }

    #[test]
    fn artifacts_land_in_run_id_dir() {
        let dir = tempfile::tempdir().unwrap();
        let r = result();
        let run_dir = save_artifacts(&r, dir.path()).unwrap();
        assert!(run_dir.ends_with(&r.run_id));
        for file in ["summary.json", "trades.csv", "equity.csv"] {
            assert!(run_dir.join(file).exists(), "missing {file}");
        }
        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.run_id, r.run_id);
    }

    #[test]
    fn report_mentions_run_and_preset() {
        let r = result();
        let md = generate_report(&r);
        assert!(md.starts_with("# Backtest Report"));
        assert!(md.contains(&r.run_id));
        assert!(md.contains("high_roi"));
    }
}
