//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Trade-based metrics work on round trips (all legs of one position, net of
//! commission), not on individual legs.

use scalper_core::domain::{TradeLeg, TradeRecord};
use serde::{Deserialize, Serialize};

/// One-minute bars, trading around the clock.
pub const BARS_PER_YEAR: f64 = 525_600.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub round_trips: usize,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_losing_streak: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and the ledger's legs.
    pub fn compute(equity_curve: &[f64], trades: &[TradeRecord]) -> Self {
        let round_trips = round_trip_pnls(trades);
        Self {
            total_return: total_return(equity_curve),
            sharpe: sharpe_ratio(equity_curve),
            sortino: sortino_ratio(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(&round_trips),
            profit_factor: profit_factor(&round_trips),
            trade_count: trades.len(),
            round_trips: round_trips.len(),
            max_consecutive_wins: max_consecutive(&round_trips, true),
            max_consecutive_losses: max_consecutive(&round_trips, false),
            avg_losing_streak: avg_losing_streak(&round_trips),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Net P&L per round trip, in close order. Trailing partial legs of a
/// position still open at the end are dropped.
pub fn round_trip_pnls(trades: &[TradeRecord]) -> Vec<f64> {
    let mut out = Vec::new();
    let mut running = 0.0;
    for t in trades {
        running += t.net_pnl();
        if t.leg == TradeLeg::Final {
            out.push(running);
            running = 0.0;
        }
    }
    out
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Annualized Sharpe ratio from per-bar returns.
///
/// Sharpe = mean(returns) / std(returns) * sqrt(BARS_PER_YEAR).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * BARS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(equity_curve: &[f64]) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r * r)
        .sum();
    if downside == 0.0 {
        return 0.0; // no downside → ratio undefined
    }
    let downside_std = (downside / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * BARS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of round trips with positive net P&L.
pub fn win_rate(round_trips: &[f64]) -> f64 {
    if round_trips.is_empty() {
        return 0.0;
    }
    round_trips.iter().filter(|p| **p > 0.0).count() as f64 / round_trips.len() as f64
}

/// Gross profits / gross losses, capped at 100.0 when there are no losses.
pub fn profit_factor(round_trips: &[f64]) -> f64 {
    if round_trips.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = round_trips.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = round_trips.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Average length of losing streaks.
pub fn avg_losing_streak(round_trips: &[f64]) -> f64 {
    let mut streaks: Vec<usize> = Vec::new();
    let mut current = 0;
    for &pnl in round_trips {
        if pnl > 0.0 {
            if current > 0 {
                streaks.push(current);
            }
            current = 0;
        } else {
            current += 1;
        }
    }
    if current > 0 {
        streaks.push(current);
    }
    if streaks.is_empty() {
        return 0.0;
    }
    streaks.iter().sum::<usize>() as f64 / streaks.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity samples.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(round_trips: &[f64], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for &pnl in round_trips {
        if (pnl > 0.0) == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scalper_core::domain::{ExitReason, Side};

    fn leg(pnl: f64, leg: TradeLeg, commission: f64) -> TradeRecord {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        TradeRecord::new(
            Side::Long,
            leg,
            t,
            t,
            100.0,
            100.0 + pnl,
            1.0,
            commission,
            1,
            ExitReason::Target,
        )
    }

    #[test]
    fn total_return_basic() {
        assert!((total_return(&[100.0, 110.0]) - 0.1).abs() < 1e-12);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn max_drawdown_from_peak() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd - (-0.25)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn flat_equity_has_zero_ratios() {
        let flat = vec![100.0; 50];
        assert_eq!(sharpe_ratio(&flat), 0.0);
        assert_eq!(sortino_ratio(&flat), 0.0);
    }

    #[test]
    fn rising_equity_has_positive_sharpe() {
        let curve: Vec<f64> = (0..100)
            .map(|i| 100.0 + i as f64 + if i % 2 == 0 { 0.5 } else { 0.0 })
            .collect();
        assert!(sharpe_ratio(&curve) > 0.0);
    }

    #[test]
    fn legs_group_into_round_trips() {
        let trades = vec![
            leg(2.0, TradeLeg::Partial, 0.1),
            leg(-1.0, TradeLeg::Final, 0.1),
            leg(-3.0, TradeLeg::Final, 0.0),
            leg(5.0, TradeLeg::Partial, 0.0),
        ];
        let rts = round_trip_pnls(&trades);
        assert_eq!(rts.len(), 2);
        assert!((rts[0] - 0.8).abs() < 1e-12);
        assert_eq!(rts[1], -3.0);

        let m = PerformanceMetrics::compute(&[100.0, 101.0], &trades);
        assert_eq!(m.trade_count, 4);
        assert_eq!(m.round_trips, 2);
        assert_eq!(m.win_rate, 0.5);
    }

    #[test]
    fn profit_factor_caps_without_losses() {
        assert_eq!(profit_factor(&[1.0, 2.0]), 100.0);
        assert_eq!(profit_factor(&[]), 0.0);
        assert!((profit_factor(&[3.0, -1.5]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn streaks() {
        let rts = [1.0, -1.0, -2.0, 3.0, -1.0, 4.0, 5.0, 6.0];
        assert_eq!(max_consecutive(&rts, true), 3);
        assert_eq!(max_consecutive(&rts, false), 2);
        assert!((avg_losing_streak(&rts) - 1.5).abs() < 1e-12);
    }
}
