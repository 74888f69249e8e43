//! Synthetic one-minute bars for development and tests.
//!
//! A seeded random walk: per-minute returns are normal with the configured
//! drift and `volatility / sqrt(1440)` spread, and the drift is redrawn at
//! random every 12 hours. Volume is higher between 09:00 and 17:59 UTC.
//! The same config always produces the same bars.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scalper_core::domain::Bar;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

const MINUTES_PER_DAY: usize = 1440;

/// Parameters of the synthetic generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub start: DateTime<Utc>,
    pub days: u32,
    pub initial_price: f64,
    /// Daily volatility as a fraction (0.02 = 2%).
    pub volatility: f64,
    /// Initial per-minute drift.
    pub trend: f64,
    pub base_volume: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            days: 30,
            initial_price: 65.0,
            volatility: 0.02,
            trend: 0.0001,
            base_volume: 100_000.0,
            seed: 42,
        }
    }
}

/// Generate `days × 1440` bars.
pub fn generate_bars(config: &SyntheticConfig) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let total = config.days as usize * MINUTES_PER_DAY;
    let minute_vol = config.volatility / (MINUTES_PER_DAY as f64).sqrt();
    let intrabar_vol = minute_vol * 0.5;

    let mut trend = config.trend;
    let mut price = config.initial_price;
    let mut bars = Vec::with_capacity(total);

    for i in 0..total {
        let timestamp = config.start + Duration::minutes(i as i64);
        price *= 1.0 + trend + minute_vol * standard_normal(&mut rng);

        let open = price;
        let high = open * (1.0 + (intrabar_vol * standard_normal(&mut rng)).abs());
        let low = open * (1.0 - (intrabar_vol * standard_normal(&mut rng)).abs());
        let close = if high > low {
            rng.gen_range(low..high)
        } else {
            open
        };

        let active = (9..=17).contains(&timestamp.hour());
        let multiplier = if active {
            rng.gen_range(1.2..2.0)
        } else {
            rng.gen_range(0.5..1.0)
        };
        let volume = (config.base_volume * multiplier * rng.gen_range(0.8..1.2)).floor();

        bars.push(Bar {
            timestamp,
            open: round3(open),
            high: round3(high),
            low: round3(low),
            close: round3(close),
            volume,
        });
        price = close;

        if i % 720 == 0 && rng.gen_bool(0.5) {
            trend = rng.gen_range(-0.0002..0.0003);
        }
    }
    bars
}

/// Box–Muller transform over two uniforms.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>(); // (0, 1]
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
