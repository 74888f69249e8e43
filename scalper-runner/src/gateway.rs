//! Simulated execution: every intent fills at the issuing bar's close.

use scalper_core::domain::{Bar, Fill, OrderIntent, Rejection};
use scalper_core::{ExecutionGateway, Submission};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Commission as a fraction of notional (0.06%).
pub const DEFAULT_COMMISSION_RATE: f64 = 0.0006;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedGateway {
    /// Fraction of notional charged per fill.
    pub commission_rate: f64,
    /// Intents larger than this are rejected.
    pub size_limit: Option<f64>,
    pub fills: usize,
    pub rejections: usize,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(DEFAULT_COMMISSION_RATE)
    }
}

impl SimulatedGateway {
    pub fn new(commission_rate: f64) -> Self {
        Self {
            commission_rate,
            size_limit: None,
            fills: 0,
            rejections: 0,
        }
    }

    pub fn with_size_limit(mut self, limit: f64) -> Self {
        self.size_limit = Some(limit);
        self
    }
}

impl ExecutionGateway for SimulatedGateway {
    fn submit(&mut self, intent: &OrderIntent, bar: &Bar) -> Submission {
        if let Some(limit) = self.size_limit {
            if intent.size > limit {
                self.rejections += 1;
                debug!(size = intent.size, limit, "intent above size limit");
                return Submission::Rejected(Rejection::new(format!(
                    "size {} above limit {limit}",
                    intent.size
                )));
            }
        }
        self.fills += 1;
        Submission::Filled(Fill {
            price: bar.close,
            size: intent.size,
            timestamp: bar.timestamp,
            commission: bar.close * intent.size * self.commission_rate,
        })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
