//! PositionLifecycle — the single position's state machine.
//!
//! ```text
//! FLAT → ENTRY_PENDING → OPEN ⇄ PARTIAL_PENDING
//!                          ↓
//!                     EXIT_PENDING → FLAT
//! ```
//!
//! A pending state carries exactly one outstanding [`OrderIntent`]; no other
//! intent is produced until its fill or rejection arrives.
//!
//! Per-bar protocol while OPEN, in order, stopping at the first intent:
//! 1. watermark
//! 2. breakeven stop move (no intent)
//! 3. partial exit
//! 4. trailing stop move (no intent)
//! 5. stop hit
//! 6. target hit
//!
//! Steps 2–4 need a valid ATR and are skipped without one; 5–6 always run.

pub mod ratchet;

pub use ratchet::StopRatchet;

use crate::config::ExitParams;
use crate::domain::{
    round_to, Bar, ExitReason, Fill, OrderIntent, OrderKind, Position, PositionFlags,
    PositionSide, Rejection, Side, TradeLeg, TradeRecord, MIN_ORDER_SIZE,
};
use crate::error::InvariantViolation;
use serde::{Deserialize, Serialize};
use std::mem;
use tracing::{debug, info, warn};

/// Remaining size below this is treated as fully closed.
const SIZE_EPSILON: f64 = 1e-9;

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Flat,
    EntryPending,
    Open,
    PartialPending,
    ExitPending,
}

impl Phase {
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            Phase::EntryPending | Phase::PartialPending | Phase::ExitPending
        )
    }
}

/// What a confirmed fill did to the position.
#[derive(Debug, Clone, PartialEq)]
pub enum FillEffect {
    /// An entry filled; the position is now OPEN.
    Opened(Position),
    /// Part of the position closed; the rest stays OPEN.
    Reduced(TradeRecord),
    /// The position is flat again. `round_trip_pnl` sums every leg.
    Closed {
        record: TradeRecord,
        round_trip_pnl: f64,
    },
}

#[derive(Debug, Clone)]
struct PendingEntry {
    intent: OrderIntent,
    entry_atr: f64,
    bar_index: usize,
}

#[derive(Debug, Clone)]
struct Tracked {
    position: Position,
    ratchet: StopRatchet,
    /// Commission paid on the entry fill, attributed pro rata to exit legs.
    entry_commission: f64,
}

#[derive(Debug, Clone)]
enum State {
    Flat,
    EntryPending(PendingEntry),
    Open(Tracked),
    PartialPending(Tracked, OrderIntent),
    ExitPending(Tracked, OrderIntent),
}

#[derive(Debug, Clone)]
pub struct PositionLifecycle {
    exits: ExitParams,
    size_precision: u32,
    state: State,
}

impl PositionLifecycle {
    pub fn new(exits: &ExitParams, size_precision: u32) -> Self {
        Self {
            exits: exits.clone(),
            size_precision,
            state: State::Flat,
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Flat => Phase::Flat,
            State::EntryPending(_) => Phase::EntryPending,
            State::Open(_) => Phase::Open,
            State::PartialPending(..) => Phase::PartialPending,
            State::ExitPending(..) => Phase::ExitPending,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, State::Flat)
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            State::Open(t) | State::PartialPending(t, _) | State::ExitPending(t, _) => {
                Some(&t.position)
            }
            State::Flat | State::EntryPending(_) => None,
        }
    }

    pub fn position_side(&self) -> PositionSide {
        self.position()
            .map(|p| p.side.into())
            .unwrap_or(PositionSide::Flat)
    }

    /// The outstanding intent, if any.
    pub fn pending(&self) -> Option<&OrderIntent> {
        match &self.state {
            State::EntryPending(p) => Some(&p.intent),
            State::PartialPending(_, i) | State::ExitPending(_, i) => Some(i),
            State::Flat | State::Open(_) => None,
        }
    }

    // ── Transitions ────────────────────────────────────────────────────

    /// FLAT → ENTRY_PENDING. `entry_atr` is the signal bar's ATR; stops and
    /// targets are placed from it once the fill price is known.
    pub fn begin_entry(
        &mut self,
        side: Side,
        size: f64,
        entry_atr: f64,
        bar_index: usize,
    ) -> Result<OrderIntent, InvariantViolation> {
        match self.state {
            State::Flat => {}
            State::Open(_) => return Err(InvariantViolation::PositionOpen),
            _ => {
                return Err(InvariantViolation::IntentOutstanding {
                    requested: OrderKind::Open,
                })
            }
        }
        let intent = OrderIntent::open(side, size);
        self.state = State::EntryPending(PendingEntry {
            intent: intent.clone(),
            entry_atr,
            bar_index,
        });
        Ok(intent)
    }

    /// OPEN → EXIT_PENDING for an externally requested close.
    pub fn begin_close(&mut self, reason: ExitReason) -> Result<OrderIntent, InvariantViolation> {
        match mem::replace(&mut self.state, State::Flat) {
            State::Open(t) => {
                let intent = OrderIntent::full_close(t.position.side, t.position.size, reason);
                self.state = State::ExitPending(t, intent.clone());
                Ok(intent)
            }
            State::Flat => Err(InvariantViolation::NoOpenPosition),
            other => {
                self.state = other;
                Err(InvariantViolation::IntentOutstanding {
                    requested: OrderKind::FullClose,
                })
            }
        }
    }

    /// Run the per-bar protocol. Only acts while OPEN; returns at most one intent.
    /// `atr` is `None` when the reading is invalid.
    pub fn update(&mut self, bar: &Bar, atr: Option<f64>) -> Option<OrderIntent> {
        let State::Open(tracked) = &mut self.state else {
            return None;
        };
        let intent = step_open(tracked, &self.exits, self.size_precision, bar, atr)?;

        if let State::Open(t) = mem::replace(&mut self.state, State::Flat) {
            self.state = match intent.kind {
                OrderKind::PartialClose => State::PartialPending(t, intent.clone()),
                _ => State::ExitPending(t, intent.clone()),
            };
        }
        Some(intent)
    }

    /// Route a fill for the outstanding intent. `bar_index` is the index of
    /// the bar the fill belongs to.
    pub fn apply_fill(
        &mut self,
        fill: &Fill,
        bar_index: usize,
    ) -> Result<FillEffect, InvariantViolation> {
        if fill.size.is_nan() || fill.size <= 0.0 {
            return Err(InvariantViolation::EmptyFill(fill.size));
        }
        match mem::replace(&mut self.state, State::Flat) {
            State::EntryPending(pending) => {
                let tracked = self.open_position(&pending, fill);
                let position = tracked.position.clone();
                info!(
                    side = %position.side,
                    price = position.entry_price,
                    size = position.size,
                    stop = position.stop_loss,
                    target = position.take_profit,
                    "position opened"
                );
                self.state = State::Open(tracked);
                Ok(FillEffect::Opened(position))
            }
            State::PartialPending(tracked, intent) | State::ExitPending(tracked, intent) => {
                self.close_leg(tracked, &intent, fill, bar_index)
            }
            other @ (State::Flat | State::Open(_)) => {
                self.state = other;
                Err(InvariantViolation::UnexpectedFill)
            }
        }
    }

    /// Clear the outstanding intent without touching the position.
    pub fn apply_rejection(&mut self, rejection: &Rejection) -> Result<(), InvariantViolation> {
        let next = match mem::replace(&mut self.state, State::Flat) {
            State::EntryPending(p) => {
                warn!(side = %p.intent.side, reason = %rejection.reason, "entry rejected");
                State::Flat
            }
            State::PartialPending(t, _) => {
                warn!(reason = %rejection.reason, "partial exit rejected");
                State::Open(t)
            }
            State::ExitPending(t, intent) => {
                warn!(exit = %intent.reason, reason = %rejection.reason, "exit rejected");
                State::Open(t)
            }
            other @ (State::Flat | State::Open(_)) => {
                self.state = other;
                return Err(InvariantViolation::UnexpectedRejection);
            }
        };
        self.state = next;
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn open_position(&self, pending: &PendingEntry, fill: &Fill) -> Tracked {
        let side = pending.intent.side;
        let s = side.sign();
        let atr = pending.entry_atr;
        let price = fill.price;
        let stop_loss = price - s * atr * self.exits.atr_stop_multiplier;

        Tracked {
            position: Position {
                side,
                entry_price: price,
                size: fill.size,
                initial_size: fill.size,
                stop_loss,
                take_profit: price + s * atr * self.exits.atr_target_multiplier,
                partial_target: price + s * atr * self.exits.partial_target_atr,
                flags: PositionFlags::default(),
                watermark: price,
                entry_bar_index: pending.bar_index,
                entry_time: fill.timestamp,
                entry_atr: atr,
                realized_pnl: 0.0,
                commission_paid: fill.commission,
            },
            ratchet: StopRatchet::new(side, stop_loss),
            entry_commission: fill.commission,
        }
    }

    fn close_leg(
        &mut self,
        mut tracked: Tracked,
        intent: &OrderIntent,
        fill: &Fill,
        bar_index: usize,
    ) -> Result<FillEffect, InvariantViolation> {
        let remaining = tracked.position.size;
        if fill.size > remaining + SIZE_EPSILON {
            let pending = match intent.kind {
                OrderKind::PartialClose => State::PartialPending(tracked, intent.clone()),
                _ => State::ExitPending(tracked, intent.clone()),
            };
            self.state = pending;
            return Err(InvariantViolation::Overfill {
                filled: fill.size,
                remaining,
            });
        }

        let p = &mut tracked.position;
        let flattening = remaining - fill.size <= SIZE_EPSILON;
        let leg = if flattening {
            TradeLeg::Final
        } else {
            TradeLeg::Partial
        };
        let entry_share = tracked.entry_commission * fill.size / p.initial_size;
        let record = TradeRecord::new(
            p.side,
            leg,
            p.entry_time,
            fill.timestamp,
            p.entry_price,
            fill.price,
            fill.size,
            fill.commission + entry_share,
            bar_index.saturating_sub(p.entry_bar_index),
            intent.reason,
        );
        p.realized_pnl += record.pnl;
        p.commission_paid += fill.commission;

        if flattening {
            info!(
                side = %p.side,
                reason = %intent.reason,
                price = fill.price,
                pnl = p.realized_pnl,
                "position closed"
            );
            return Ok(FillEffect::Closed {
                round_trip_pnl: p.realized_pnl,
                record,
            });
        }

        p.size = remaining - fill.size;
        info!(
            side = %p.side,
            reason = %intent.reason,
            closed = fill.size,
            remaining = p.size,
            "position reduced"
        );
        self.state = State::Open(tracked);
        Ok(FillEffect::Reduced(record))
    }
}

/// Steps 1–6 on an OPEN position.
fn step_open(
    t: &mut Tracked,
    exits: &ExitParams,
    precision: u32,
    bar: &Bar,
    atr: Option<f64>,
) -> Option<OrderIntent> {
    let price = bar.close;
    let p = &mut t.position;

    // 1
    p.update_watermark(price);

    if let Some(atr) = atr.filter(|a| *a > 0.0) {
        let profit = p.profit_atr(price, atr);

        // 2
        if exits.use_breakeven && !p.flags.breakeven_moved && profit >= exits.breakeven_multiplier
        {
            let level = p.entry_price + p.side.sign() * exits.breakeven_buffer_atr * atr;
            p.stop_loss = t.ratchet.apply(level);
            p.flags.breakeven_moved = true;
            debug!(stop = p.stop_loss, "stop moved to breakeven");
        }

        // 3
        if exits.use_partial_exit && !p.flags.partial_done && profit >= exits.partial_target_atr {
            let qty = round_to(p.size * exits.partial_exit_pct, precision);
            if qty >= MIN_ORDER_SIZE && qty < p.size {
                p.flags.partial_done = true;
                return Some(OrderIntent::partial_close(p.side, qty));
            }
            debug!(qty, size = p.size, "partial exit below minimum size, skipped");
        }

        // 4
        if exits.use_trailing_stop {
            if !p.flags.trailing_active
                && p.watermark_profit_atr(atr) >= exits.trailing_activation_atr
            {
                p.flags.trailing_active = true;
                debug!(watermark = p.watermark, "trailing stop armed");
            }
            if p.flags.trailing_active {
                let proposed = p.watermark - p.side.sign() * atr * exits.trailing_distance_atr;
                if t.ratchet.improves(proposed) {
                    p.stop_loss = t.ratchet.apply(proposed);
                    debug!(stop = p.stop_loss, "trailing stop raised");
                }
            }
        }
    }

    // 5
    if p.stop_hit(price) {
        return Some(OrderIntent::full_close(p.side, p.size, ExitReason::Stop));
    }
    // 6
    if p.target_hit(price) {
        return Some(OrderIntent::full_close(p.side, p.size, ExitReason::Target));
    }
    None
}
