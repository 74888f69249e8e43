//! Parameter sweep over a grid of strategy parameters.
//!
//! Each grid point is a full backtest over the same bars; points run in
//! parallel with rayon. Combinations the config validator rejects (for
//! example a fast EMA at or above the crossover partner) are skipped.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use scalper_core::domain::Bar;
use scalper_core::StrategyConfig;

use crate::metrics::PerformanceMetrics;
use crate::runner::{run_backtest, RunError, RunOptions};

/// Values to try for each swept parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub fast_ema: Vec<usize>,
    /// Crossover partner of the fast EMA.
    pub medium_ema: Vec<usize>,
    pub atr_stop_multiplier: Vec<f64>,
    pub atr_target_multiplier: Vec<f64>,
    pub adx_threshold: Vec<f64>,
    pub risk_per_trade_pct: Vec<f64>,
    pub volume_surge_multiplier: Vec<f64>,
}

impl Default for SweepGrid {
    /// 1458 points.
    fn default() -> Self {
        Self {
            fast_ema: vec![5, 7, 9],
            medium_ema: vec![13, 17, 21],
            atr_stop_multiplier: vec![1.0, 1.5, 2.0],
            atr_target_multiplier: vec![2.0, 2.5, 3.0],
            adx_threshold: vec![15.0, 20.0, 25.0],
            risk_per_trade_pct: vec![0.5, 1.0],
            volume_surge_multiplier: vec![1.2, 1.3, 1.5],
        }
    }
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub fast_ema: usize,
    pub medium_ema: usize,
    pub atr_stop_multiplier: f64,
    pub atr_target_multiplier: f64,
    pub adx_threshold: f64,
    pub risk_per_trade_pct: f64,
    pub volume_surge_multiplier: f64,
}

impl SweepParams {
    /// Overwrite the swept fields of `base`.
    pub fn apply(&self, base: &StrategyConfig) -> StrategyConfig {
        let mut config = base.clone();
        config.indicators.fast_ema = self.fast_ema;
        config.indicators.medium_ema = self.medium_ema;
        config.exits.atr_stop_multiplier = self.atr_stop_multiplier;
        config.exits.atr_target_multiplier = self.atr_target_multiplier;
        config.entry.adx_threshold = self.adx_threshold;
        config.risk.risk_per_trade_pct = self.risk_per_trade_pct;
        config.entry.volume_surge_multiplier = self.volume_surge_multiplier;
        config
    }
}

impl SweepGrid {
    /// Number of raw grid points, before validation.
    pub fn size(&self) -> usize {
        self.fast_ema.len()
            * self.medium_ema.len()
            * self.atr_stop_multiplier.len()
            * self.atr_target_multiplier.len()
            * self.adx_threshold.len()
            * self.risk_per_trade_pct.len()
            * self.volume_surge_multiplier.len()
    }

    pub fn points(&self) -> Vec<SweepParams> {
        let mut out = Vec::with_capacity(self.size());
        for &fast_ema in &self.fast_ema {
            for &medium_ema in &self.medium_ema {
                for &atr_stop_multiplier in &self.atr_stop_multiplier {
                    for &atr_target_multiplier in &self.atr_target_multiplier {
                        for &adx_threshold in &self.adx_threshold {
                            for &risk_per_trade_pct in &self.risk_per_trade_pct {
                                for &volume_surge_multiplier in &self.volume_surge_multiplier {
                                    out.push(SweepParams {
                                        fast_ema,
                                        medium_ema,
                                        atr_stop_multiplier,
                                        atr_target_multiplier,
                                        adx_threshold,
                                        risk_per_trade_pct,
                                        volume_surge_multiplier,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Valid configurations for every grid point, paired with their params.
    pub fn configs(&self, base: &StrategyConfig) -> Vec<(SweepParams, StrategyConfig)> {
        self.points()
            .into_iter()
            .filter_map(|params| {
                let config = params.apply(base);
                match config.validate() {
                    Ok(()) => Some((params, config)),
                    Err(e) => {
                        debug!(?params, error = %e, "skipping invalid grid point");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Outcome of one grid point. The full result is not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub params: SweepParams,
    pub run_id: String,
    pub final_equity: f64,
    pub metrics: PerformanceMetrics,
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub grid_size: usize,
    pub skipped: usize,
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by `key`, best first. NaN keys sort last.
    pub fn ranked_by<F>(&self, key: F) -> Vec<&SweepEntry>
    where
        F: Fn(&PerformanceMetrics) -> f64,
    {
        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            let (ka, kb) = (key(&a.metrics), key(&b.metrics));
            kb.partial_cmp(&ka).unwrap_or_else(|| ka.is_nan().cmp(&kb.is_nan()))
        });
        sorted
    }

    /// Top N by total return.
    pub fn top_n(&self, n: usize) -> Vec<&SweepEntry> {
        self.ranked_by(|m| m.total_return).into_iter().take(n).collect()
    }

    pub fn best_return(&self) -> Option<&SweepEntry> {
        self.top_n(1).into_iter().next()
    }

    pub fn best_sharpe(&self) -> Option<&SweepEntry> {
        self.ranked_by(|m| m.sharpe).into_iter().next()
    }

    /// Highest win rate among entries with at least one round trip.
    pub fn best_win_rate(&self) -> Option<&SweepEntry> {
        self.ranked_by(|m| m.win_rate)
            .into_iter()
            .find(|e| e.metrics.round_trips > 0)
    }
}

/// Run every valid grid point over `bars`.
pub fn sweep(
    bars: &[Bar],
    base: &StrategyConfig,
    grid: &SweepGrid,
    options: &RunOptions,
) -> Result<SweepReport, RunError> {
    let configs = grid.configs(base);
    let grid_size = grid.size();
    info!(
        grid_size,
        runs = configs.len(),
        preset = base.preset.name(),
        "starting sweep"
    );

    let entries = configs
        .par_iter()
        .map(|(params, config)| {
            let result = run_backtest(bars, config, options)?;
            Ok(SweepEntry {
                params: *params,
                run_id: result.run_id,
                final_equity: result.final_equity,
                metrics: result.metrics,
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    Ok(SweepReport {
        grid_size,
        skipped: grid_size - entries.len(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{generate_bars, SyntheticConfig};
    use scalper_core::StrategyPreset;

    fn small_grid() -> SweepGrid {
        SweepGrid {
            fast_ema: vec![5, 9],
            medium_ema: vec![9, 13],
            atr_stop_multiplier: vec![1.5],
            atr_target_multiplier: vec![2.0, 3.0],
            adx_threshold: vec![20.0],
            risk_per_trade_pct: vec![1.0],
            volume_surge_multiplier: vec![1.3],
        }
    }

    fn entry(total_return: f64, sharpe: f64, win_rate: f64, round_trips: usize) -> SweepEntry {
        SweepEntry {
            params: small_grid().points()[0],
            run_id: format!("{total_return}"),
            final_equity: 0.0,
            metrics: PerformanceMetrics {
                total_return,
                sharpe,
                win_rate,
                round_trips,
                ..PerformanceMetrics::default()
            },
        }
    }

    #[test]
    fn default_grid_size() {
        let grid = SweepGrid::default();
        assert_eq!(grid.size(), 1458);
        assert_eq!(grid.points().len(), 1458);
    }

    #[test]
    fn invalid_points_are_skipped() {
        let base = StrategyPreset::Scalper1m.to_config();
        let configs = small_grid().configs(&base);
        // (9, 9) fails fast < medium
        assert_eq!(small_grid().size(), 8);
        assert_eq!(configs.len(), 6);
        assert!(configs
            .iter()
            .all(|(p, c)| p.fast_ema < p.medium_ema && c.indicators.medium_ema == p.medium_ema));
    }

    #[test]
    fn params_apply_to_every_section() {
        let base = StrategyPreset::HighRoi.to_config();
        let params = SweepParams {
            fast_ema: 7,
            medium_ema: 17,
            atr_stop_multiplier: 2.0,
            atr_target_multiplier: 3.0,
            adx_threshold: 25.0,
            risk_per_trade_pct: 0.5,
            volume_surge_multiplier: 1.2,
        };
        let c = params.apply(&base);
        assert_eq!(c.indicators.fast_ema, 7);
        assert_eq!(c.indicators.medium_ema, 17);
        assert_eq!(c.exits.atr_stop_multiplier, 2.0);
        assert_eq!(c.exits.atr_target_multiplier, 3.0);
        assert_eq!(c.entry.adx_threshold, 25.0);
        assert_eq!(c.risk.risk_per_trade_pct, 0.5);
        assert_eq!(c.entry.volume_surge_multiplier, 1.2);
        assert_eq!(c.indicators.slow_ema, base.indicators.slow_ema);
    }

    #[test]
    fn ranking_picks_each_best() {
        let report = SweepReport {
            grid_size: 3,
            skipped: 0,
            entries: vec![
                entry(0.05, 1.0, 0.4, 10),
                entry(0.10, 0.5, 0.3, 10),
                entry(-0.02, 2.0, 1.0, 0),
            ],
        };
        assert_eq!(report.best_return().unwrap().metrics.total_return, 0.10);
        assert_eq!(report.best_sharpe().unwrap().metrics.sharpe, 2.0);
        // a perfect rate with no trades does not count
        assert_eq!(report.best_win_rate().unwrap().metrics.win_rate, 0.4);
        let top = report.top_n(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].metrics.total_return, 0.05);
    }

    #[test]
    fn sweep_runs_each_valid_point() {
        let bars = generate_bars(&SyntheticConfig {
            days: 1,
            seed: 9,
            ..SyntheticConfig::default()
        });
        let base = StrategyPreset::HighRoi.to_config();
        let grid = SweepGrid {
            medium_ema: vec![9, 13],
            ..small_grid()
        };
        let report = sweep(&bars, &base, &grid, &RunOptions::default()).unwrap();
        assert_eq!(report.grid_size, 8);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.len(), 6);

        let mut ids: Vec<_> = report.entries.iter().map(|e| e.run_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }
}
