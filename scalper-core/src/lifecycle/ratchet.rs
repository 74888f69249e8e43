//! Stop ratchet.
//!
//! **Core rule:** a stop may tighten, never loosen, even when ATR expands.
//! Every stop move (breakeven, trailing) passes through here, so trailing
//! stops stay monotone whatever order the moves fire in.

use crate::domain::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct StopRatchet {
    level: f64,
    side: Side,
}

impl StopRatchet {
    pub fn new(side: Side, initial_level: f64) -> Self {
        Self {
            level: initial_level,
            side,
        }
    }

    /// Apply a proposed stop and return the ratcheted level.
    ///
    /// - Long: max(current, proposed)
    /// - Short: min(current, proposed)
    ///
    /// Non-finite proposals are ignored.
    ///
    /// # Example
    /// ```
    /// use scalper_core::domain::Side;
    /// use scalper_core::lifecycle::StopRatchet;
    ///
    /// let mut ratchet = StopRatchet::new(Side::Long, 97.0);
    /// assert_eq!(ratchet.apply(100.4), 100.4);
    /// // loosening is blocked
    /// assert_eq!(ratchet.apply(99.0), 100.4);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        if !proposed.is_finite() {
            return self.level;
        }
        self.level = match self.side {
            Side::Long => self.level.max(proposed),
            Side::Short => self.level.min(proposed),
        };
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Whether `proposed` would tighten the stop.
    pub fn improves(&self, proposed: f64) -> bool {
        match self.side {
            Side::Long => proposed > self.level,
            Side::Short => proposed < self.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_tightening_allowed() {
        let mut r = StopRatchet::new(Side::Long, 95.0);
        assert_eq!(r.apply(100.0), 100.0);
        assert_eq!(r.level(), 100.0);
    }

    #[test]
    fn long_loosening_blocked() {
        let mut r = StopRatchet::new(Side::Long, 100.0);
        assert_eq!(r.apply(90.0), 100.0);
    }

    #[test]
    fn short_tightening_allowed() {
        let mut r = StopRatchet::new(Side::Short, 105.0);
        assert_eq!(r.apply(100.0), 100.0);
    }

    #[test]
    fn short_loosening_blocked() {
        let mut r = StopRatchet::new(Side::Short, 100.0);
        assert_eq!(r.apply(110.0), 100.0);
    }

    #[test]
    fn volatility_trap() {
        // Price at 110, ATR expands 5 → 10: 110 - 2*10 = 90 would loosen.
        let mut r = StopRatchet::new(Side::Long, 95.0);
        assert_eq!(r.apply(90.0), 95.0);
    }

    #[test]
    fn nan_proposal_ignored() {
        let mut r = StopRatchet::new(Side::Long, 95.0);
        assert_eq!(r.apply(f64::NAN), 95.0);
    }

    #[test]
    fn improves_is_side_aware() {
        let r = StopRatchet::new(Side::Short, 100.0);
        assert!(r.improves(99.0));
        assert!(!r.improves(101.0));
    }
}
