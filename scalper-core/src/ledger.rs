//! TradeLedger — closed-trade history and per-date aggregates.
//!
//! Append-only. Every closing fill (partial or final) appends one
//! [`TradeRecord`]; entry fills only bump the daily entry count.
//! Read access is all a reporting collaborator gets.

use crate::domain::{TradeLeg, TradeRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Realized activity on one trading date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub realized_pnl: f64,
    pub commission: f64,
    pub entries: u32,
    /// Closing fills, partial legs included.
    pub closes: u32,
    pub wins: u32,
    pub losses: u32,
}

impl DailyAggregate {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }
}

/// Headline statistics over every recorded leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub trades: usize,
    /// Legs that closed the position.
    pub round_trips: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Gross profit / gross loss, capped at 100.
    pub profit_factor: f64,
    pub avg_duration_minutes: f64,
    pub total_pnl: f64,
    pub total_commission: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    records: Vec<TradeRecord>,
    daily: BTreeMap<NaiveDate, DailyAggregate>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entry(&mut self, date: NaiveDate) {
        self.day(date).entries += 1;
    }

    /// Append a closing leg. The leg counts toward the date it closed on.
    pub fn record_close(&mut self, record: TradeRecord) {
        let day = self.day(record.exit_time.date_naive());
        day.realized_pnl += record.pnl;
        day.commission += record.commission;
        day.closes += 1;
        if record.is_winner() {
            day.wins += 1;
        } else {
            day.losses += 1;
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn daily(&self) -> impl Iterator<Item = &DailyAggregate> {
        self.daily.values()
    }

    pub fn day_of(&self, date: NaiveDate) -> Option<&DailyAggregate> {
        self.daily.get(&date)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> LedgerSummary {
        summarize(&self.records)
    }

    fn day(&mut self, date: NaiveDate) -> &mut DailyAggregate {
        self.daily
            .entry(date)
            .or_insert_with(|| DailyAggregate::new(date))
    }
}

pub fn summarize(records: &[TradeRecord]) -> LedgerSummary {
    if records.is_empty() {
        return LedgerSummary::default();
    }
    let wins: Vec<f64> = records
        .iter()
        .filter(|r| r.is_winner())
        .map(|r| r.pnl)
        .collect();
    let losses: Vec<f64> = records
        .iter()
        .filter(|r| !r.is_winner())
        .map(|r| r.pnl)
        .collect();

    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().map(|l| l.abs()).sum();
    let profit_factor = if gross_loss < 1e-10 {
        if gross_profit > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (gross_profit / gross_loss).min(100.0)
    };

    let n = records.len() as f64;
    LedgerSummary {
        trades: records.len(),
        round_trips: records.iter().filter(|r| r.leg == TradeLeg::Final).count(),
        wins: wins.len(),
        losses: losses.len(),
        win_rate: wins.len() as f64 / n,
        avg_win: mean(&wins),
        avg_loss: mean(&losses),
        profit_factor,
        avg_duration_minutes: records.iter().map(|r| r.duration_minutes()).sum::<f64>() / n,
        total_pnl: records.iter().map(|r| r.pnl).sum(),
        total_commission: records.iter().map(|r| r.commission).sum(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitReason, Side};
    use chrono::{Duration, TimeZone, Utc};

    fn record(day: u32, pnl_per_unit: f64, minutes: i64, leg: TradeLeg) -> TradeRecord {
        let entry = Utc.with_ymd_and_hms(2024, 2, day, 10, 0, 0).unwrap();
        TradeRecord::new(
            Side::Long,
            leg,
            entry,
            entry + Duration::minutes(minutes),
            100.0,
            100.0 + pnl_per_unit,
            1.0,
            0.1,
            minutes as usize,
            ExitReason::Target,
        )
    }

    #[test]
    fn aggregates_by_exit_date() {
        let mut ledger = TradeLedger::new();
        let d1 = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        ledger.record_entry(d1);
        ledger.record_close(record(5, 2.0, 10, TradeLeg::Partial));
        ledger.record_close(record(5, -1.0, 20, TradeLeg::Final));
        ledger.record_entry(NaiveDate::from_ymd_opt(2024, 2, 6).unwrap());
        ledger.record_close(record(6, 3.0, 5, TradeLeg::Final));

        let day = ledger.day_of(d1).unwrap();
        assert_eq!(day.entries, 1);
        assert_eq!(day.closes, 2);
        assert_eq!(day.wins, 1);
        assert_eq!(day.losses, 1);
        assert!((day.realized_pnl - 1.0).abs() < 1e-12);
        assert_eq!(ledger.daily().count(), 2);
    }

    #[test]
    fn summary_statistics() {
        let mut ledger = TradeLedger::new();
        ledger.record_close(record(5, 4.0, 10, TradeLeg::Final));
        ledger.record_close(record(5, 2.0, 20, TradeLeg::Final));
        ledger.record_close(record(5, -3.0, 30, TradeLeg::Final));
        let s = ledger.summary();
        assert_eq!(s.trades, 3);
        assert_eq!(s.round_trips, 3);
        assert_eq!(s.wins, 2);
        assert_eq!(s.losses, 1);
        assert!((s.win_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.avg_win - 3.0).abs() < 1e-12);
        assert!((s.avg_loss + 3.0).abs() < 1e-12);
        assert!((s.profit_factor - 2.0).abs() < 1e-12);
        assert!((s.avg_duration_minutes - 20.0).abs() < 1e-12);
        assert!((s.total_pnl - 3.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_capped_without_losses() {
        let s = summarize(&[record(5, 1.0, 1, TradeLeg::Final)]);
        assert_eq!(s.profit_factor, 100.0);
    }

    #[test]
    fn empty_summary_is_zeroed() {
        assert_eq!(TradeLedger::new().summary(), LedgerSummary::default());
    }

    #[test]
    fn breakeven_trade_counts_as_loss() {
        let s = summarize(&[record(5, 0.0, 1, TradeLeg::Final)]);
        assert_eq!(s.wins, 0);
        assert_eq!(s.losses, 1);
    }
}
