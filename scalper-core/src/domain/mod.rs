//! Domain types for the scalper engine.

pub mod bar;
pub mod order;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use order::{ExitReason, Fill, OrderIntent, OrderKind, Rejection, Side};
pub use position::{Position, PositionFlags, PositionSide};
pub use trade::{TradeLeg, TradeOutcome, TradeRecord};

/// Smallest order size the engine will ever emit.
pub const MIN_ORDER_SIZE: f64 = 0.01;

/// Round `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_precision() {
        assert_eq!(round_to(133.3333, 2), 133.33);
        assert_eq!(round_to(0.0049, 2), 0.0);
        assert_eq!(round_to(0.0126, 3), 0.013);
        assert_eq!(round_to(1.5, 0), 2.0);
    }
}
