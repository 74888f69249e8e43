//! Engine — the per-bar control loop around the decision components.
//!
//! For each bar, in order:
//! 1. reject out-of-order timestamps
//! 2. tick the governor's bar clock and run the date rollover
//! 3. record mark-to-market equity at the close
//! 4. if an intent is outstanding, do nothing else
//! 5. if a position is open, run the lifecycle protocol
//! 6. otherwise gate → evaluate → size → entry intent
//!
//! Confirmations come back through [`Engine::on_fill`] and
//! [`Engine::on_rejection`], either straight from [`Engine::step`] or later
//! from an asynchronous gateway.

pub mod account;
pub mod gateway;

pub use account::{Account, EquityPoint};
pub use gateway::{ExecutionGateway, Submission};

use crate::config::StrategyConfig;
use crate::domain::{Bar, ExitReason, Fill, OrderIntent, Rejection};
use crate::error::{EngineError, InvariantViolation};
use crate::indicators::{IndicatorId, IndicatorSnapshot};
use crate::ledger::TradeLedger;
use crate::lifecycle::{FillEffect, PositionLifecycle};
use crate::notify::TradeNotification;
use crate::risk::{RiskGovernor, RiskState};
use crate::signal::{Decision, RulePath, SignalEvaluator, SkipReason};
use crate::sizer::PositionSizer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::mem;
use tracing::{debug, info, trace};

/// Run-level settings that are not strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Instrument name carried on notifications.
    pub symbol: String,
    pub initial_equity: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            symbol: "LTCUSDT".to_string(),
            initial_equity: 10_000.0,
        }
    }
}

/// Counters for run reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub bars: usize,
    pub signals: usize,
    pub vetoed_bars: usize,
    pub data_gaps: usize,
    pub rejections: usize,
}

pub struct Engine {
    options: EngineOptions,
    evaluator: SignalEvaluator,
    governor: RiskGovernor,
    sizer: PositionSizer,
    lifecycle: PositionLifecycle,
    ledger: TradeLedger,
    account: Account,
    equity_curve: Vec<EquityPoint>,
    outbox: Vec<TradeNotification>,
    stats: EngineStats,
    last_bar: Option<DateTime<Utc>>,
    /// Rule that produced the outstanding entry intent.
    pending_rule: Option<RulePath>,
    /// Rule of the open position, for exit notifications.
    open_rule: Option<RulePath>,
}

impl Engine {
    /// Build an engine for a validated config.
    pub fn new(config: &StrategyConfig, options: EngineOptions) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            evaluator: SignalEvaluator::new(config),
            governor: RiskGovernor::new(config.risk.clone()),
            sizer: PositionSizer::new(&config.risk, &config.exits),
            lifecycle: PositionLifecycle::new(&config.exits, config.risk.size_precision),
            ledger: TradeLedger::new(),
            account: Account::new(options.initial_equity),
            equity_curve: Vec::new(),
            outbox: Vec::new(),
            stats: EngineStats::default(),
            last_bar: None,
            pending_rule: None,
            open_rule: None,
            options,
        })
    }

    // ── Event handlers ─────────────────────────────────────────────────

    /// Process one bar. Returns the intent to submit, if any.
    pub fn on_bar(
        &mut self,
        bar: &Bar,
        snap: &IndicatorSnapshot,
    ) -> Result<Option<OrderIntent>, EngineError> {
        if let Some(previous) = self.last_bar {
            if bar.timestamp < previous {
                return Err(InvariantViolation::OutOfOrderBar {
                    previous,
                    bar: bar.timestamp,
                }
                .into());
            }
        }
        self.last_bar = Some(bar.timestamp);
        let bar_index = self.stats.bars;
        self.stats.bars += 1;

        let equity = self.account.equity(self.lifecycle.position(), bar.close);
        self.governor.on_bar();
        self.governor.roll_date(bar.date(), equity);
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity,
        });

        if self.lifecycle.phase().is_pending() {
            trace!(bar = bar_index, "intent outstanding, bar skipped");
            return Ok(None);
        }

        if self.lifecycle.position().is_some() {
            let atr = snap.get(IndicatorId::Atr).filter(|a| *a > 0.0);
            if atr.is_none() {
                self.stats.data_gaps += 1;
                debug!(bar = bar_index, "ATR invalid, stop management limited to stop/target");
            }
            return Ok(self.lifecycle.update(bar, atr));
        }

        if self.governor.gate(bar.date(), equity).is_err() {
            self.stats.vetoed_bars += 1;
            return Ok(None);
        }

        match self.evaluator.evaluate(bar, snap, self.stats.bars) {
            Decision::Signal { side, rule } => {
                let atr = snap.get(IndicatorId::Atr);
                let size = self.sizer.size(equity, atr);
                let intent =
                    self.lifecycle
                        .begin_entry(side, size, atr.unwrap_or(0.0), bar_index)?;
                self.stats.signals += 1;
                self.pending_rule = Some(rule);
                info!(%side, %rule, size, price = bar.close, "entry signal");
                Ok(Some(intent))
            }
            Decision::NoSignal(reason) => {
                if matches!(reason, SkipReason::DataGap(_)) {
                    self.stats.data_gaps += 1;
                }
                trace!(bar = bar_index, ?reason, "no signal");
                Ok(None)
            }
        }
    }

    /// Route a fill for the outstanding intent.
    pub fn on_fill(&mut self, fill: Fill) -> Result<(), EngineError> {
        let intent = self
            .lifecycle
            .pending()
            .cloned()
            .ok_or(InvariantViolation::UnexpectedFill)?;
        let before = self.lifecycle.position().cloned();
        let bar_index = self.stats.bars.saturating_sub(1);

        let effect = self.lifecycle.apply_fill(&fill, bar_index)?;
        self.account.commission += fill.commission;

        let notification = match effect {
            FillEffect::Opened(position) => {
                self.governor.record_entry();
                self.ledger.record_entry(fill.timestamp.date_naive());
                self.open_rule = self.pending_rule.take();
                TradeNotification::from_fill(
                    &self.options.symbol,
                    &intent,
                    fill.price,
                    fill.size,
                    position.stop_loss,
                    position.take_profit,
                    self.open_rule,
                    None,
                    fill.timestamp,
                )
            }
            FillEffect::Reduced(record) => {
                let pnl = record.pnl;
                self.account.realized_pnl += pnl;
                self.governor.record_close(pnl, false);
                self.ledger.record_close(record);
                let (stop, target) = self
                    .lifecycle
                    .position()
                    .map(|p| (p.stop_loss, p.take_profit))
                    .unwrap_or_default();
                TradeNotification::from_fill(
                    &self.options.symbol,
                    &intent,
                    fill.price,
                    fill.size,
                    stop,
                    target,
                    self.open_rule,
                    Some(pnl),
                    fill.timestamp,
                )
            }
            FillEffect::Closed {
                record,
                round_trip_pnl,
            } => {
                let pnl = record.pnl;
                self.account.realized_pnl += pnl;
                self.governor.record_close(pnl, true);
                self.ledger.record_close(record);
                info!(
                    round_trip_pnl,
                    streak = self.governor.state().consecutive_losses,
                    "round trip complete"
                );
                let (stop, target) = before
                    .map(|p| (p.stop_loss, p.take_profit))
                    .unwrap_or_default();
                TradeNotification::from_fill(
                    &self.options.symbol,
                    &intent,
                    fill.price,
                    fill.size,
                    stop,
                    target,
                    self.open_rule.take(),
                    Some(pnl),
                    fill.timestamp,
                )
            }
        };
        self.outbox.push(notification);
        Ok(())
    }

    /// Clear the outstanding intent after a rejection. No retry.
    pub fn on_rejection(&mut self, rejection: Rejection) -> Result<(), EngineError> {
        self.lifecycle.apply_rejection(&rejection)?;
        self.pending_rule = None;
        self.stats.rejections += 1;
        Ok(())
    }

    /// `on_bar`, then submit any intent and route an immediate answer.
    /// Returns the gateway's answer, or `None` when no intent was issued.
    pub fn step<G: ExecutionGateway + ?Sized>(
        &mut self,
        gateway: &mut G,
        bar: &Bar,
        snap: &IndicatorSnapshot,
    ) -> Result<Option<Submission>, EngineError> {
        let Some(intent) = self.on_bar(bar, snap)? else {
            return Ok(None);
        };
        let submission = gateway.submit(&intent, bar);
        self.route(&submission)?;
        Ok(Some(submission))
    }

    /// Close any open position through `gateway`, e.g. at the end of data.
    pub fn flatten<G: ExecutionGateway + ?Sized>(
        &mut self,
        gateway: &mut G,
        bar: &Bar,
    ) -> Result<Option<Submission>, EngineError> {
        if self.lifecycle.position().is_none() || self.lifecycle.phase().is_pending() {
            return Ok(None);
        }
        self.lifecycle.begin_close(ExitReason::Manual)?;
        let Some(position) = self.lifecycle.position().cloned() else {
            return Ok(None);
        };
        let submission = gateway.close(&position, ExitReason::Manual, bar);
        self.route(&submission)?;
        if let Some(last) = self.equity_curve.last_mut() {
            last.equity = self.account.equity(self.lifecycle.position(), bar.close);
        }
        Ok(Some(submission))
    }

    fn route(&mut self, submission: &Submission) -> Result<(), EngineError> {
        match submission {
            Submission::Filled(fill) => self.on_fill(fill.clone()),
            Submission::Rejected(rejection) => self.on_rejection(rejection.clone()),
            Submission::Pending => Ok(()),
        }
    }

    // ── Read access ────────────────────────────────────────────────────

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn risk_state(&self) -> &RiskState {
        self.governor.state()
    }

    pub fn lifecycle(&self) -> &PositionLifecycle {
        &self.lifecycle
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Take every queued notification.
    pub fn drain_notifications(&mut self) -> Vec<TradeNotification> {
        mem::take(&mut self.outbox)
    }
}
