//! RiskGovernor — account-level entry gating.
//!
//! Gate stages, each a hard veto checked in order:
//! 1. calendar-date rollover (resets the daily fields, idempotent per date)
//! 2. daily loss cap
//! 3. daily trade-count cap
//! 4. consecutive-loss streak
//! 5. cooldown since the last entry
//!
//! The governor only sees trade events and the bar clock; it never reads
//! prices or indicators.

use crate::config::{CooldownPolicy, RiskParams};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Cross-bar, cross-day bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Realized P&L of the current trading date (partial legs included).
    pub daily_pnl: f64,
    /// Entry fills on the current trading date.
    pub daily_trade_count: u32,
    pub consecutive_losses: u32,
    /// Bars since the last entry fill. `u32::MAX` until the first entry.
    pub bars_since_last_trade: u32,
    pub daily_starting_equity: f64,
    pub last_reset_date: Option<NaiveDate>,
}

impl Default for RiskState {
    fn default() -> Self {
        Self {
            daily_pnl: 0.0,
            daily_trade_count: 0,
            consecutive_losses: 0,
            bars_since_last_trade: u32::MAX,
            daily_starting_equity: 0.0,
            last_reset_date: None,
        }
    }
}

/// The gate stage that refused an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Veto {
    DailyLossCap { loss_pct: f64, limit_pct: f64 },
    DailyTradeCap { trades: u32, limit: u32 },
    ConsecutiveLosses { streak: u32, limit: u32 },
    Cooldown { bars: u32, required: u32 },
}

impl fmt::Display for Veto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Veto::DailyLossCap {
                loss_pct,
                limit_pct,
            } => write!(f, "daily loss {loss_pct:.2}% ≥ {limit_pct:.2}%"),
            Veto::DailyTradeCap { trades, limit } => {
                write!(f, "daily trades {trades} ≥ {limit}")
            }
            Veto::ConsecutiveLosses { streak, limit } => {
                write!(f, "{streak} consecutive losses (limit {limit})")
            }
            Veto::Cooldown { bars, required } => {
                write!(f, "cooldown {bars}/{required} bars")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskGovernor {
    params: RiskParams,
    state: RiskState,
}

impl RiskGovernor {
    pub fn new(params: RiskParams) -> Self {
        Self {
            params,
            state: RiskState::default(),
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Reset the daily fields if `date` differs from the last reset date.
    /// Returns whether a reset happened; calling twice for one date is a no-op.
    pub fn roll_date(&mut self, date: NaiveDate, equity: f64) -> bool {
        if self.state.last_reset_date == Some(date) {
            return false;
        }
        if let Some(previous) = self.state.last_reset_date {
            info!(
                %previous,
                %date,
                daily_pnl = self.state.daily_pnl,
                trades = self.state.daily_trade_count,
                "trading day closed"
            );
        }
        self.state.daily_pnl = 0.0;
        self.state.daily_trade_count = 0;
        self.state.daily_starting_equity = equity;
        if self.params.reset_streak_daily {
            self.state.consecutive_losses = 0;
        }
        self.state.last_reset_date = Some(date);
        true
    }

    /// Run the full gate for a bar on `date`. Rollover first, then stages 2–5.
    pub fn gate(&mut self, date: NaiveDate, equity: f64) -> Result<(), Veto> {
        self.roll_date(date, equity);
        let result = self.check();
        if let Err(veto) = &result {
            debug!(%veto, "entry vetoed");
        }
        result
    }

    /// Stages 2–5 against the current state.
    pub fn check(&self) -> Result<(), Veto> {
        let s = &self.state;
        let p = &self.params;

        if s.daily_pnl < 0.0 && s.daily_starting_equity > 0.0 {
            let loss_pct = -s.daily_pnl / s.daily_starting_equity * 100.0;
            if loss_pct >= p.max_daily_loss_pct {
                return Err(Veto::DailyLossCap {
                    loss_pct,
                    limit_pct: p.max_daily_loss_pct,
                });
            }
        }

        if s.daily_trade_count >= p.max_daily_trades {
            return Err(Veto::DailyTradeCap {
                trades: s.daily_trade_count,
                limit: p.max_daily_trades,
            });
        }

        if p.max_consecutive_losses > 0 && s.consecutive_losses >= p.max_consecutive_losses {
            return Err(Veto::ConsecutiveLosses {
                streak: s.consecutive_losses,
                limit: p.max_consecutive_losses,
            });
        }

        let cooling = match p.cooldown_policy {
            CooldownPolicy::AfterLoss => s.consecutive_losses > 0,
            CooldownPolicy::AfterAnyTrade => true,
        };
        if cooling && s.bars_since_last_trade < p.cooldown_bars {
            return Err(Veto::Cooldown {
                bars: s.bars_since_last_trade,
                required: p.cooldown_bars,
            });
        }

        Ok(())
    }

    /// Advance the bar clock.
    pub fn on_bar(&mut self) {
        self.state.bars_since_last_trade = self.state.bars_since_last_trade.saturating_add(1);
    }

    /// An entry fill: counts toward the daily cap and restarts the cooldown clock.
    pub fn record_entry(&mut self) {
        self.state.daily_trade_count += 1;
        self.state.bars_since_last_trade = 0;
    }

    /// A closing fill. Every leg feeds `daily_pnl`; only the leg that
    /// flattens the position (`final_leg`) moves the loss streak, judged on
    /// that leg's own P&L.
    pub fn record_close(&mut self, pnl: f64, final_leg: bool) {
        self.state.daily_pnl += pnl;
        if !final_leg {
            return;
        }
        if pnl < 0.0 {
            self.state.consecutive_losses += 1;
        } else {
            self.state.consecutive_losses = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyPreset;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn governor() -> RiskGovernor {
        RiskGovernor::new(StrategyPreset::HighRoi.to_config().risk)
    }

    /// Enter, let `bars` pass, then close the whole position at `pnl`.
    fn round_trip(g: &mut RiskGovernor, pnl: f64, bars: u32) {
        g.record_entry();
        for _ in 0..bars {
            g.on_bar();
        }
        g.record_close(pnl, true);
    }

    #[test]
    fn fresh_governor_permits_entry() {
        let mut g = governor();
        assert_eq!(g.gate(day(1), 10_000.0), Ok(()));
        assert_eq!(g.state().daily_starting_equity, 10_000.0);
    }

    #[test]
    fn rollover_is_idempotent_per_date() {
        let mut g = governor();
        assert!(g.roll_date(day(1), 10_000.0));
        g.record_entry();
        g.record_close(-50.0, true);
        let before = g.state().clone();
        assert!(!g.roll_date(day(1), 9_000.0));
        assert_eq!(g.state(), &before);
    }

    #[test]
    fn rollover_resets_daily_fields_only() {
        let mut g = governor();
        g.roll_date(day(1), 10_000.0);
        round_trip(&mut g, -50.0, 5);
        assert!(g.roll_date(day(2), 9_950.0));
        let s = g.state();
        assert_eq!(s.daily_pnl, 0.0);
        assert_eq!(s.daily_trade_count, 0);
        assert_eq!(s.daily_starting_equity, 9_950.0);
        assert_eq!(s.consecutive_losses, 1);
        assert_eq!(s.last_reset_date, Some(day(2)));
    }

    #[test]
    fn daily_loss_cap_vetoes() {
        let mut g = governor();
        g.roll_date(day(1), 10_000.0);
        round_trip(&mut g, -300.0, 10);
        assert!(matches!(
            g.gate(day(1), 9_700.0),
            Err(Veto::DailyLossCap { .. })
        ));
        assert_eq!(g.gate(day(2), 9_700.0), Ok(()));
    }

    #[test]
    fn loss_below_cap_permits() {
        let mut g = governor();
        g.roll_date(day(1), 10_000.0);
        round_trip(&mut g, -299.0, 10);
        g.record_entry();
        g.record_close(1.0, true);
        for _ in 0..5 {
            g.on_bar();
        }
        assert_eq!(g.gate(day(1), 9_702.0), Ok(()));
    }

    #[test]
    fn loss_cap_skipped_without_starting_equity() {
        let mut g = governor();
        g.roll_date(day(1), 0.0);
        g.record_entry();
        g.record_close(-500.0, false);
        assert!(!matches!(g.check(), Err(Veto::DailyLossCap { .. })));
    }

    #[test]
    fn trade_cap_vetoes_until_next_date() {
        let mut g = governor();
        g.roll_date(day(1), 10_000.0);
        for _ in 0..15 {
            round_trip(&mut g, 1.0, 3);
        }
        assert_eq!(
            g.gate(day(1), 10_015.0),
            Err(Veto::DailyTradeCap {
                trades: 15,
                limit: 15
            })
        );
        assert_eq!(g.gate(day(2), 10_015.0), Ok(()));
    }

    #[test]
    fn consecutive_losses_veto_until_a_win() {
        let mut g = governor();
        g.roll_date(day(1), 100_000.0);
        for _ in 0..3 {
            round_trip(&mut g, -10.0, 5);
        }
        assert!(matches!(
            g.gate(day(1), 99_970.0),
            Err(Veto::ConsecutiveLosses { streak: 3, .. })
        ));
        // the veto holds across dates
        assert!(matches!(
            g.gate(day(2), 99_970.0),
            Err(Veto::ConsecutiveLosses { .. })
        ));
        round_trip(&mut g, 5.0, 5);
        assert_eq!(g.state().consecutive_losses, 0);
        assert_eq!(g.gate(day(2), 99_975.0), Ok(()));
    }

    #[test]
    fn streak_can_reset_daily() {
        let mut params = StrategyPreset::HighRoi.to_config().risk;
        params.reset_streak_daily = true;
        let mut g = RiskGovernor::new(params);
        g.roll_date(day(1), 100_000.0);
        for _ in 0..3 {
            round_trip(&mut g, -10.0, 5);
        }
        assert!(g.gate(day(1), 99_970.0).is_err());
        assert_eq!(g.gate(day(2), 99_970.0), Ok(()));
    }

    #[test]
    fn zero_limit_disables_streak_veto() {
        let mut params = StrategyPreset::HighRoi.to_config().risk;
        params.max_consecutive_losses = 0;
        let mut g = RiskGovernor::new(params);
        g.roll_date(day(1), 1_000_000.0);
        for _ in 0..10 {
            round_trip(&mut g, -1.0, 5);
        }
        assert_eq!(g.check(), Ok(()));
    }

    #[test]
    fn cooldown_after_loss() {
        let mut g = governor();
        g.roll_date(day(1), 10_000.0);
        round_trip(&mut g, -10.0, 1);
        assert_eq!(
            g.check(),
            Err(Veto::Cooldown {
                bars: 1,
                required: 2
            })
        );
        g.on_bar();
        assert_eq!(g.check(), Ok(()));
    }

    #[test]
    fn no_cooldown_after_win_under_after_loss_policy() {
        let mut g = governor();
        g.roll_date(day(1), 10_000.0);
        round_trip(&mut g, 10.0, 0);
        assert_eq!(g.check(), Ok(()));
    }

    #[test]
    fn cooldown_after_any_trade() {
        let mut g = RiskGovernor::new(StrategyPreset::Scalper1m.to_config().risk);
        g.roll_date(day(1), 10_000.0);
        round_trip(&mut g, 10.0, 1);
        assert!(matches!(g.check(), Err(Veto::Cooldown { .. })));
        g.on_bar();
        assert_eq!(g.check(), Ok(()));
    }

    #[test]
    fn final_leg_decides_streak() {
        let mut g = governor();
        g.roll_date(day(1), 10_000.0);
        g.record_entry();
        g.record_close(30.0, false);
        assert_eq!(g.state().consecutive_losses, 0);
        g.record_close(-20.0, true);
        assert_eq!(g.state().consecutive_losses, 1);
        assert_eq!(g.state().daily_pnl, 10.0);

        // a losing partial does not count; the winning remainder resets
        g.record_entry();
        g.record_close(-5.0, false);
        assert_eq!(g.state().consecutive_losses, 1);
        g.record_close(8.0, true);
        assert_eq!(g.state().consecutive_losses, 0);
    }

    #[test]
    fn bar_clock_saturates() {
        let mut g = governor();
        assert_eq!(g.state().bars_since_last_trade, u32::MAX);
        g.on_bar();
        assert_eq!(g.state().bars_since_last_trade, u32::MAX);
        g.record_entry();
        assert_eq!(g.state().bars_since_last_trade, 0);
        g.on_bar();
        assert_eq!(g.state().bars_since_last_trade, 1);
    }
}
