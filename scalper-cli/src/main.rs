//! Scalper CLI — backtest, sweep and data commands.
//!
//! Commands:
//! - `run` — backtest a TOML config or named preset over a CSV file
//! - `sweep` — grid search over the preset's key parameters
//! - `generate` — write seeded synthetic one-minute bars to CSV
//! - `presets` — list presets, or print one as TOML
//! - `validate` — load a config through the full pipeline and report

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;

use scalper_core::domain::Bar;
use scalper_core::{StrategyConfig, StrategyPreset};
use scalper_runner::export::{generate_report, save_sweep_report};
use scalper_runner::{
    generate_bars, load_bars, run_backtest, save_artifacts, save_bars, sweep, BacktestResult,
    RunOptions, SweepEntry, SweepGrid, SyntheticConfig,
};

#[derive(Parser)]
#[command(
    name = "scalper",
    about = "Scalper CLI — one-minute trading decision engine and backtester"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a config or preset over bar data.
    Run {
        /// CSV file with timestamp,open,high,low,close,volume.
        #[arg(long, required_unless_present = "synthetic")]
        data: Option<PathBuf>,

        /// Use 30 days of seeded synthetic bars instead of a file.
        #[arg(long, default_value_t = false, conflicts_with = "data")]
        synthetic: bool,

        /// Path to a TOML config file.
        #[arg(long, conflicts_with = "preset")]
        config: Option<PathBuf>,

        /// Named preset: high_roi, scalper_1m. Defaults to high_roi.
        #[arg(long)]
        preset: Option<String>,

        /// Symbol recorded on notifications and reports.
        #[arg(long, default_value = "LTCUSDT")]
        symbol: String,

        /// Starting equity.
        #[arg(long, default_value_t = 10_000.0)]
        cash: f64,

        /// Commission as a fraction of notional per fill.
        #[arg(long, default_value_t = 0.0006)]
        commission: f64,

        /// Reject intents larger than this size.
        #[arg(long)]
        size_limit: Option<f64>,

        /// Leave a position open at the end of the data.
        #[arg(long, default_value_t = false)]
        no_flatten: bool,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Also write a Markdown report next to the artifacts.
        #[arg(long, default_value_t = false)]
        report: bool,
    },
    /// Grid search over EMA periods, ATR multipliers, ADX, risk and volume.
    Sweep {
        /// CSV file with timestamp,open,high,low,close,volume.
        #[arg(long)]
        data: PathBuf,

        /// Preset supplying the non-swept parameters.
        #[arg(long, default_value = "scalper_1m")]
        preset: String,

        /// Starting equity.
        #[arg(long, default_value_t = 10_000.0)]
        cash: f64,

        /// Commission as a fraction of notional per fill.
        #[arg(long, default_value_t = 0.0006)]
        commission: f64,

        /// Number of top results to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write the full report as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write seeded synthetic one-minute bars to CSV.
    Generate {
        /// Output CSV path.
        #[arg(long)]
        output: PathBuf,

        /// Number of days (1440 bars each).
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Starting price.
        #[arg(long, default_value_t = 65.0)]
        price: f64,

        /// First bar's date (YYYY-MM-DD). Defaults to 2024-01-01.
        #[arg(long)]
        start: Option<String>,
    },
    /// List presets, or print one as TOML.
    Presets {
        /// Preset to print.
        name: Option<String>,
    },
    /// Load a config file through the full pipeline and report problems.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            synthetic,
            config,
            preset,
            symbol,
            cash,
            commission,
            size_limit,
            no_flatten,
            output_dir,
            report,
        } => {
            let options = RunOptions {
                symbol,
                initial_equity: cash,
                commission_rate: commission,
                size_limit,
                flatten_at_end: !no_flatten,
            };
            run_cmd(
                data.as_deref(),
                synthetic,
                config.as_deref(),
                preset.as_deref(),
                &options,
                &output_dir,
                report,
            )
        }
        Commands::Sweep {
            data,
            preset,
            cash,
            commission,
            top,
            output,
        } => {
            let options = RunOptions {
                initial_equity: cash,
                commission_rate: commission,
                ..RunOptions::default()
            };
            sweep_cmd(&data, &preset, &options, top, output.as_deref())
        }
        Commands::Generate {
            output,
            days,
            seed,
            price,
            start,
        } => generate_cmd(&output, days, seed, price, start.as_deref()),
        Commands::Presets { name } => presets_cmd(name.as_deref()),
        Commands::Validate { config } => validate_cmd(&config),
    }
}

/// fmt layer to stderr with a per-target level filter.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            tracing_subscriber::filter::Targets::new()
                .with_target("scalper_core", level)
                .with_target("scalper_runner", level)
                .with_default(tracing::Level::WARN),
        );
    tracing_subscriber::registry().with(fmt_layer).init();
}

fn run_cmd(
    data: Option<&Path>,
    synthetic: bool,
    config_path: Option<&Path>,
    preset_name: Option<&str>,
    options: &RunOptions,
    output_dir: &Path,
    report: bool,
) -> Result<()> {
    let config = resolve_config(config_path, preset_name)?;
    let bars = match (data, synthetic) {
        (Some(path), _) => load_bars(path)?,
        (None, true) => generate_bars(&SyntheticConfig::default()),
        (None, false) => bail!("one of --data or --synthetic is required"),
    };

    let result = run_backtest(&bars, &config, options)?;
    print_summary(&result);
    if synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
        println!();
    }

    let run_dir = save_artifacts(&result, output_dir)?;
    if report {
        let path = run_dir.join("report.md");
        std::fs::write(&path, generate_report(&result))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn sweep_cmd(
    data: &Path,
    preset_name: &str,
    options: &RunOptions,
    top: usize,
    output: Option<&Path>,
) -> Result<()> {
    let base = StrategyPreset::from_name(preset_name)?.to_config();
    let bars = load_bars(data)?;
    let grid = SweepGrid::default();

    println!(
        "Sweeping {} grid points over {} bars ({} preset)...",
        grid.size(),
        bars.len(),
        base.preset.name()
    );
    let report = sweep(&bars, &base, &grid, options)?;
    println!(
        "Completed {} runs ({} invalid combinations skipped)",
        report.len(),
        report.skipped
    );

    println!();
    println!("--- Top {top} by total return ---");
    print_sweep_header();
    for entry in report.top_n(top) {
        print_sweep_row(entry);
    }

    println!();
    if let Some(best) = report.best_sharpe() {
        println!("Best Sharpe:");
        print_sweep_header();
        print_sweep_row(best);
    }
    if let Some(best) = report.best_win_rate() {
        println!("Best Win Rate:");
        print_sweep_header();
        print_sweep_row(best);
    }

    if let Some(path) = output {
        save_sweep_report(&report, path)?;
        println!();
        println!("Sweep report saved to: {}", path.display());
    }
    Ok(())
}

fn generate_cmd(
    output: &Path,
    days: u32,
    seed: u64,
    price: f64,
    start: Option<&str>,
) -> Result<()> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    if price <= 0.0 {
        bail!("--price must be positive, got {price}");
    }
    let mut config = SyntheticConfig {
        days,
        seed,
        initial_price: price,
        ..SyntheticConfig::default()
    };
    if let Some(s) = start {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --start date '{s}'"))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .with_context(|| format!("invalid --start date '{s}'"))?;
        config.start = Utc.from_utc_datetime(&midnight);
    }

    let bars = generate_bars(&config);
    save_bars(output, &bars)?;
    print_range(&bars);
    println!("Wrote {} bars to {}", bars.len(), output.display());
    Ok(())
}

fn presets_cmd(name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let config = StrategyPreset::from_name(name)?.to_config();
            print!("{}", config.to_toml_string()?);
        }
        None => {
            for preset in StrategyPreset::ALL {
                let marker = if preset == StrategyPreset::default() {
                    " (default)"
                } else {
                    ""
                };
                println!("{}{marker}", preset.name());
            }
        }
    }
    Ok(())
}

fn validate_cmd(path: &Path) -> Result<()> {
    let config = StrategyConfig::from_file(path)
        .with_context(|| format!("invalid config {}", path.display()))?;
    println!("{}: OK", path.display());
    println!("Preset:       {}", config.preset.name());
    println!("Warm-up bars: {}", config.min_lookback());
    Ok(())
}

fn resolve_config(path: Option<&Path>, preset: Option<&str>) -> Result<StrategyConfig> {
    match (path, preset) {
        (Some(path), _) => Ok(StrategyConfig::from_file(path)?),
        (None, Some(name)) => Ok(StrategyPreset::from_name(name)?.to_config()),
        (None, None) => Ok(StrategyConfig::default()),
    }
}

fn print_range(bars: &[Bar]) {
    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        println!("Range: {} to {}", first.timestamp, last.timestamp);
    }
}

fn print_sweep_header() {
    println!(
        "{:<5} {:<6} {:<5} {:<6} {:<5} {:<5} {:<5} {:>9} {:>8} {:>7} {:>6}",
        "fast", "medium", "stop", "target", "adx", "risk", "vol", "return", "sharpe", "win", "trips"
    );
}

fn print_sweep_row(e: &SweepEntry) {
    let p = &e.params;
    println!(
        "{:<5} {:<6} {:<5.1} {:<6.1} {:<5.0} {:<5.1} {:<5.1} {:>8.2}% {:>8.3} {:>6.1}% {:>6}",
        p.fast_ema,
        p.medium_ema,
        p.atr_stop_multiplier,
        p.atr_target_multiplier,
        p.adx_threshold,
        p.risk_per_trade_pct,
        p.volume_surge_multiplier,
        e.metrics.total_return * 100.0,
        e.metrics.sharpe,
        e.metrics.win_rate * 100.0,
        e.metrics.round_trips,
    );
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", result.run_id);
    println!("Symbol:         {}", result.options.symbol);
    println!("Preset:         {}", result.config.preset.name());
    println!("Period:         {} to {}", result.start, result.end);
    println!("Bars:           {}", result.bar_count);
    println!("Signals:        {}", result.stats.signals);
    println!("Vetoed Bars:    {}", result.stats.vetoed_bars);
    println!("Data Gaps:      {}", result.stats.data_gaps);
    println!("Rejections:     {}", result.stats.rejections);
    println!("Notifications:  {}", result.notifications);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", result.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Round Trips:    {}", m.round_trips);
    println!("Legs:           {}", m.trade_count);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!("Avg Lose Streak:{:.1}", m.avg_losing_streak);
    println!(
        "Avg Duration:   {:.1} min",
        result.summary.avg_duration_minutes
    );
    println!("Commission:     {:.2}", result.summary.total_commission);
    if result.risk.consecutive_losses > 0 {
        println!(
            "Open Streak:    {} losses",
            result.risk.consecutive_losses
        );
    }
    println!();
}
