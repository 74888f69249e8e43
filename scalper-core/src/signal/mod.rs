//! Signal evaluation: (bar, indicator snapshot, config) → entry decision.
//!
//! Preconditions run first, in a fixed order: warm-up, ATR validity,
//! session window, trend strength, volume surge, ADX. Any failure yields
//! [`Decision::NoSignal`] with the reason. Rules are then tried per
//! direction in order (EMA crossover, MACD crossover, Bollinger breakout),
//! Long before Short; the first match wins and a Long match suppresses
//! Short evaluation entirely.
//!
//! The evaluator holds no mutable state and never sees the account.

pub mod filters;

use crate::config::{EntryParams, SessionParams, StrategyConfig};
use crate::domain::{Bar, Side};
use crate::indicators::{IndicatorId, IndicatorSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rule produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePath {
    EmaCrossover,
    MacdCrossover,
    BollingerBreakout,
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RulePath::EmaCrossover => "ema_crossover",
            RulePath::MacdCrossover => "macd_crossover",
            RulePath::BollingerBreakout => "bollinger_breakout",
        };
        f.write_str(s)
    }
}

/// Why no signal was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Warmup { bars: usize, required: usize },
    DataGap(IndicatorId),
    Session,
    TrendStrength,
    VolumeSurge,
    Adx,
    NoRuleMatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Signal { side: Side, rule: RulePath },
    NoSignal(SkipReason),
}

impl Decision {
    pub fn side(&self) -> Option<Side> {
        match self {
            Decision::Signal { side, .. } => Some(*side),
            Decision::NoSignal(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    entry: EntryParams,
    session: SessionParams,
    min_lookback: usize,
}

impl SignalEvaluator {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            entry: config.entry.clone(),
            session: config.session.clone(),
            min_lookback: config.min_lookback(),
        }
    }

    /// Evaluate one bar. `bars_seen` counts bars including this one.
    pub fn evaluate(&self, bar: &Bar, snap: &IndicatorSnapshot, bars_seen: usize) -> Decision {
        if let Err(reason) = self.preconditions(bar, snap, bars_seen) {
            return Decision::NoSignal(reason);
        }

        for side in [Side::Long, Side::Short] {
            if let Some(rule) = self.match_rules(bar, snap, side) {
                return Decision::Signal { side, rule };
            }
        }
        Decision::NoSignal(SkipReason::NoRuleMatched)
    }

    fn preconditions(
        &self,
        bar: &Bar,
        snap: &IndicatorSnapshot,
        bars_seen: usize,
    ) -> Result<(), SkipReason> {
        if bars_seen < self.min_lookback {
            return Err(SkipReason::Warmup {
                bars: bars_seen,
                required: self.min_lookback,
            });
        }
        match snap.get(IndicatorId::Atr) {
            Some(atr) if atr > 0.0 => {}
            _ => return Err(SkipReason::DataGap(IndicatorId::Atr)),
        }
        if !filters::in_session(bar.timestamp, &self.session) {
            return Err(SkipReason::Session);
        }
        if self.entry.require_trend
            && !filters::trend_strength(bar, snap, self.entry.min_trend_strength)
        {
            return Err(SkipReason::TrendStrength);
        }
        if !self.volume_confirmed(bar, snap) {
            return Err(SkipReason::VolumeSurge);
        }
        if self.entry.require_adx && !filters::adx_strong(snap, self.entry.adx_threshold) {
            return Err(SkipReason::Adx);
        }
        Ok(())
    }

    /// Passes when the volume requirement is off.
    fn volume_confirmed(&self, bar: &Bar, snap: &IndicatorSnapshot) -> bool {
        !self.entry.require_volume_surge
            || filters::volume_surge(bar, snap, self.entry.volume_surge_multiplier)
    }

    fn match_rules(&self, bar: &Bar, snap: &IndicatorSnapshot, side: Side) -> Option<RulePath> {
        if self.ema_crossover(bar, snap, side).unwrap_or(false) {
            return Some(RulePath::EmaCrossover);
        }
        if self.entry.enable_macd_rule && self.macd_crossover(snap, side).unwrap_or(false) {
            return Some(RulePath::MacdCrossover);
        }
        if self.entry.allow_bb_breakout && self.bb_breakout(bar, snap, side).unwrap_or(false) {
            return Some(RulePath::BollingerBreakout);
        }
        None
    }

    /// Fast/medium crossover, price on the trend side of the slow EMA, RSI in
    /// the directional band, then the optional MACD and pullback filters.
    /// `None` when a required value is invalid.
    fn ema_crossover(&self, bar: &Bar, snap: &IndicatorSnapshot, side: Side) -> Option<bool> {
        let cross = snap.get(IndicatorId::EmaCross)?;
        let slow = snap.get(IndicatorId::EmaSlow)?;
        let rsi = snap.get(IndicatorId::Rsi)?;
        let e = &self.entry;

        let core = match side {
            Side::Long => {
                cross > 0.0
                    && bar.close > slow
                    && e.rsi_neutral_low < rsi
                    && rsi < e.rsi_overbought
            }
            Side::Short => {
                cross < 0.0
                    && bar.close < slow
                    && e.rsi_oversold < rsi
                    && rsi < e.rsi_neutral_high
            }
        };
        if !core {
            return Some(false);
        }
        if e.require_macd_agreement && !filters::macd_agrees(snap, side, e.macd_zero_line) {
            return Some(false);
        }
        if e.require_bb_pullback && !filters::bb_pullback(bar, snap, side) {
            return Some(false);
        }
        Some(true)
    }

    /// MACD/signal crossover with the full EMA stack aligned and RSI on the
    /// trade's side of the midline.
    fn macd_crossover(&self, snap: &IndicatorSnapshot, side: Side) -> Option<bool> {
        let cross = snap.get(IndicatorId::MacdCross)?;
        let fast = snap.get(IndicatorId::EmaFast)?;
        let medium = snap.get(IndicatorId::EmaMedium)?;
        let slow = snap.get(IndicatorId::EmaSlow)?;
        let rsi = snap.get(IndicatorId::Rsi)?;
        let e = &self.entry;

        Some(match side {
            Side::Long => {
                cross > 0.0
                    && fast > medium
                    && medium > slow
                    && rsi > e.rsi_midline
                    && rsi < e.rsi_overbought
            }
            Side::Short => {
                cross < 0.0
                    && fast < medium
                    && medium < slow
                    && rsi < e.rsi_midline
                    && rsi > e.rsi_oversold
            }
        })
    }

    /// Close beyond the outer band with fast/slow alignment, RSI past the
    /// midline and volume confirmation.
    fn bb_breakout(&self, bar: &Bar, snap: &IndicatorSnapshot, side: Side) -> Option<bool> {
        let fast = snap.get(IndicatorId::EmaFast)?;
        let slow = snap.get(IndicatorId::EmaSlow)?;
        let rsi = snap.get(IndicatorId::Rsi)?;
        let e = &self.entry;

        let breakout = match side {
            Side::Long => {
                bar.close > snap.get(IndicatorId::BbUpper)? && fast > slow && rsi > e.rsi_midline
            }
            Side::Short => {
                bar.close < snap.get(IndicatorId::BbLower)? && fast < slow && rsi < e.rsi_midline
            }
        };
        Some(breakout && self.volume_confirmed(bar, snap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyPreset;
    use chrono::{TimeZone, Utc};

    fn bar(close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 6, 10, 30, 0).unwrap(),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
        }
    }

    /// A warm snapshot with nothing crossing.
    fn quiet() -> IndicatorSnapshot {
        IndicatorSnapshot::new()
            .with(IndicatorId::EmaFast, 100.0)
            .with(IndicatorId::EmaMedium, 100.0)
            .with(IndicatorId::EmaSlow, 100.0)
            .with(IndicatorId::Rsi, 50.0)
            .with(IndicatorId::MacdLine, 0.0)
            .with(IndicatorId::MacdSignal, 0.0)
            .with(IndicatorId::BbUpper, 104.0)
            .with(IndicatorId::BbMiddle, 100.0)
            .with(IndicatorId::BbLower, 96.0)
            .with(IndicatorId::Atr, 0.5)
            .with(IndicatorId::Adx, 25.0)
            .with(IndicatorId::VolumeMa, 1000.0)
            .with(IndicatorId::EmaCross, 0.0)
            .with(IndicatorId::MacdCross, 0.0)
    }

    fn long_cross() -> IndicatorSnapshot {
        quiet()
            .with(IndicatorId::EmaCross, 1.0)
            .with(IndicatorId::EmaSlow, 99.0)
            .with(IndicatorId::Rsi, 60.0)
    }

    fn high_roi() -> SignalEvaluator {
        SignalEvaluator::new(&StrategyPreset::HighRoi.to_config())
    }

    #[test]
    fn long_ema_crossover() {
        let d = high_roi().evaluate(&bar(100.0), &long_cross(), 100);
        assert_eq!(
            d,
            Decision::Signal {
                side: Side::Long,
                rule: RulePath::EmaCrossover
            }
        );
    }

    #[test]
    fn short_ema_crossover() {
        let snap = quiet()
            .with(IndicatorId::EmaCross, -1.0)
            .with(IndicatorId::EmaSlow, 101.0)
            .with(IndicatorId::Rsi, 40.0);
        assert_eq!(high_roi().evaluate(&bar(100.0), &snap, 100).side(), Some(Side::Short));
    }

    #[test]
    fn rsi_overbought_blocks_crossover() {
        let snap = long_cross().with(IndicatorId::Rsi, 75.0);
        assert_eq!(
            high_roi().evaluate(&bar(100.0), &snap, 100),
            Decision::NoSignal(SkipReason::NoRuleMatched)
        );
    }

    #[test]
    fn warmup_short_circuits() {
        let d = high_roi().evaluate(&bar(100.0), &long_cross(), 10);
        assert!(matches!(d, Decision::NoSignal(SkipReason::Warmup { bars: 10, .. })));
    }

    #[test]
    fn invalid_atr_is_data_gap() {
        let mut snap = long_cross();
        snap.invalidate(IndicatorId::Atr);
        assert_eq!(
            high_roi().evaluate(&bar(100.0), &snap, 100),
            Decision::NoSignal(SkipReason::DataGap(IndicatorId::Atr))
        );
        let zero = long_cross().with(IndicatorId::Atr, 0.0);
        assert_eq!(
            high_roi().evaluate(&bar(100.0), &zero, 100),
            Decision::NoSignal(SkipReason::DataGap(IndicatorId::Atr))
        );
    }

    #[test]
    fn macd_agreement_required_when_enabled() {
        let mut config = StrategyPreset::HighRoi.to_config();
        config.entry.require_macd_agreement = true;
        let eval = SignalEvaluator::new(&config);
        assert_eq!(
            eval.evaluate(&bar(100.0), &long_cross(), 100),
            Decision::NoSignal(SkipReason::NoRuleMatched)
        );
        let agreeing = long_cross().with(IndicatorId::MacdLine, 0.2);
        assert_eq!(eval.evaluate(&bar(100.0), &agreeing, 100).side(), Some(Side::Long));
    }

    #[test]
    fn macd_crossover_rule_needs_ema_stack() {
        let snap = quiet()
            .with(IndicatorId::MacdCross, 1.0)
            .with(IndicatorId::EmaFast, 102.0)
            .with(IndicatorId::EmaMedium, 101.0)
            .with(IndicatorId::EmaSlow, 100.0)
            .with(IndicatorId::Rsi, 55.0);
        assert_eq!(
            high_roi().evaluate(&bar(101.0), &snap, 100),
            Decision::Signal {
                side: Side::Long,
                rule: RulePath::MacdCrossover
            }
        );
        let unstacked = snap.with(IndicatorId::EmaMedium, 103.0);
        assert_eq!(
            high_roi().evaluate(&bar(101.0), &unstacked, 100),
            Decision::NoSignal(SkipReason::NoRuleMatched)
        );
    }

    #[test]
    fn bollinger_breakout_rule() {
        let snap = quiet()
            .with(IndicatorId::EmaFast, 103.0)
            .with(IndicatorId::EmaSlow, 101.0)
            .with(IndicatorId::Rsi, 58.0);
        assert_eq!(
            high_roi().evaluate(&bar(105.0), &snap, 100),
            Decision::Signal {
                side: Side::Long,
                rule: RulePath::BollingerBreakout
            }
        );
    }

    #[test]
    fn bollinger_breakout_disabled_in_scalper() {
        let mut config = StrategyPreset::Scalper1m.to_config();
        config.session.trade_24_7 = true;
        config.session.avoid_first_minutes = 0;
        config.session.avoid_last_minutes = 0;
        config.entry.require_volume_surge = false;
        let snap = quiet()
            .with(IndicatorId::EmaFast, 103.0)
            .with(IndicatorId::EmaSlow, 101.0)
            .with(IndicatorId::Rsi, 58.0);
        assert_eq!(
            SignalEvaluator::new(&config).evaluate(&bar(105.0), &snap, 100),
            Decision::NoSignal(SkipReason::NoRuleMatched)
        );
    }

    #[test]
    fn long_takes_precedence_over_short() {
        // EMA crossover up qualifies Long; Bollinger breakdown below the lower
        // band would qualify Short on the same bar.
        let snap = quiet()
            .with(IndicatorId::EmaCross, 1.0)
            .with(IndicatorId::EmaSlow, 90.0)
            .with(IndicatorId::EmaFast, 80.0)
            .with(IndicatorId::BbLower, 96.0)
            .with(IndicatorId::Rsi, 49.0);
        let mut config = StrategyPreset::HighRoi.to_config();
        config.entry.rsi_neutral_low = 45.0;
        let eval = SignalEvaluator::new(&config);
        assert!(eval.bb_breakout(&bar(95.0), &snap, Side::Short).unwrap());
        assert_eq!(
            eval.evaluate(&bar(95.0), &snap, 100),
            Decision::Signal {
                side: Side::Long,
                rule: RulePath::EmaCrossover
            }
        );
    }

    #[test]
    fn missing_rule_inputs_degrade_to_no_signal() {
        let mut snap = long_cross();
        snap.invalidate(IndicatorId::Rsi);
        assert_eq!(
            high_roi().evaluate(&bar(100.0), &snap, 100),
            Decision::NoSignal(SkipReason::NoRuleMatched)
        );
    }

    #[test]
    fn volume_requirement_vetoes() {
        let mut config = StrategyPreset::HighRoi.to_config();
        config.entry.require_volume_surge = true;
        let d = SignalEvaluator::new(&config).evaluate(&bar(100.0), &long_cross(), 100);
        assert_eq!(d, Decision::NoSignal(SkipReason::VolumeSurge));
    }

    #[test]
    fn scalper_requires_adx() {
        let mut config = StrategyPreset::Scalper1m.to_config();
        config.entry.require_volume_surge = false;
        let snap = long_cross().with(IndicatorId::Adx, 15.0);
        let d = SignalEvaluator::new(&config).evaluate(&bar(100.0), &snap, 100);
        assert_eq!(d, Decision::NoSignal(SkipReason::Adx));
    }

    #[test]
    fn scalper_pullback_and_zero_line() {
        let mut config = StrategyPreset::Scalper1m.to_config();
        config.entry.require_volume_surge = false;
        let eval = SignalEvaluator::new(&config);
        let snap = long_cross()
            .with(IndicatorId::Rsi, 55.0)
            .with(IndicatorId::MacdLine, 0.3)
            .with(IndicatorId::MacdSignal, 0.1);
        assert_eq!(eval.evaluate(&bar(99.5), &snap, 100).side(), Some(Side::Long));
        let below_zero = snap
            .clone()
            .with(IndicatorId::MacdLine, -0.1)
            .with(IndicatorId::MacdSignal, -0.3);
        assert_eq!(eval.evaluate(&bar(99.5), &below_zero, 100).side(), None);
        // above the middle band: no pullback
        assert_eq!(eval.evaluate(&bar(101.0), &snap, 100).side(), None);
    }
}
