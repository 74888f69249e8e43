//! Scalper Runner — backtest orchestration around the decision engine.
//!
//! This crate builds on `scalper-core` to provide:
//! - CSV bar loading and writing
//! - Seeded synthetic one-minute bars
//! - A simulated execution gateway with commission
//! - Single-run backtests with metrics and a deterministic run id
//! - Parallel parameter sweeps
//! - JSON/CSV/Markdown artifact export

pub mod data;
pub mod export;
pub mod gateway;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use data::{load_bars, save_bars, LoadError};
pub use export::{save_artifacts, ExportError};
pub use gateway::SimulatedGateway;
pub use metrics::PerformanceMetrics;
pub use runner::{run_backtest, BacktestResult, RunError, RunOptions};
pub use sweep::{sweep, SweepEntry, SweepGrid, SweepParams, SweepReport};
pub use synthetic::{generate_bars, SyntheticConfig};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn run_options_are_send_sync() {
        assert_send::<RunOptions>();
        assert_sync::<RunOptions>();
    }

    #[test]
    fn sweep_types_are_send_sync() {
        assert_send::<SweepGrid>();
        assert_sync::<SweepGrid>();
        assert_send::<SweepReport>();
        assert_sync::<SweepReport>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
        assert_send::<ExportError>();
        assert_sync::<ExportError>();
    }
}
