//! Strategy configuration: typed sections, named presets, and the one-time
//! load pipeline (alias migration, sentinel resolution, validation).
//!
//! The engine only ever sees a validated [`StrategyConfig`]. Legacy flat
//! parameter names and placeholder values are resolved here, before any bar
//! is processed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, warn};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown preset '{0}' (valid: high_roi, scalper_1m)")]
    UnknownPreset(String),
    #[error("unknown parameter '{0}'")]
    UnknownKey(String),
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ─── Presets ────────────────────────────────────────────────────────

/// Named parameter sets over the one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyPreset {
    /// Three-rule EMA/MACD/Bollinger scalper with optional filters.
    ///
    /// Trades around the clock by default. With `trade_24_7 = false` the
    /// session hours gate this preset exactly as they gate `scalper_1m`,
    /// even though its rules were never tuned to a session.
    #[default]
    #[serde(rename = "high_roi")]
    HighRoi,
    /// One-minute crossover scalper with mandatory ADX, volume and session filters.
    #[serde(rename = "scalper_1m")]
    Scalper1m,
}

impl StrategyPreset {
    pub const ALL: [StrategyPreset; 2] = [StrategyPreset::HighRoi, StrategyPreset::Scalper1m];

    pub fn name(self) -> &'static str {
        match self {
            StrategyPreset::HighRoi => "high_roi",
            StrategyPreset::Scalper1m => "scalper_1m",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))
    }

    /// Full default configuration for this preset.
    pub fn to_config(self) -> StrategyConfig {
        match self {
            StrategyPreset::HighRoi => StrategyConfig {
                preset: self,
                indicators: IndicatorParams {
                    fast_ema: 5,
                    medium_ema: 13,
                    slow_ema: 21,
                    rsi_period: 14,
                    macd_fast: 12,
                    macd_slow: 26,
                    macd_signal: 9,
                    bb_period: 20,
                    bb_dev: 2.0,
                    atr_period: 14,
                    adx_period: 14,
                    volume_ma_period: 20,
                },
                entry: EntryParams {
                    rsi_overbought: 70.0,
                    rsi_oversold: 30.0,
                    rsi_midline: 50.0,
                    rsi_neutral_low: 50.0,
                    rsi_neutral_high: 50.0,
                    require_macd_agreement: false,
                    macd_zero_line: false,
                    enable_macd_rule: true,
                    allow_bb_breakout: true,
                    require_bb_pullback: false,
                    require_trend: false,
                    min_trend_strength: 0.15,
                    require_adx: false,
                    adx_threshold: 20.0,
                    require_volume_surge: false,
                    volume_surge_multiplier: 1.5,
                },
                exits: ExitParams {
                    atr_stop_multiplier: 1.5,
                    atr_target_multiplier: 2.5,
                    use_breakeven: false,
                    breakeven_multiplier: 1.0,
                    breakeven_buffer_atr: 0.1,
                    use_trailing_stop: true,
                    trailing_activation_atr: 1.0,
                    trailing_distance_atr: 0.8,
                    use_partial_exit: true,
                    partial_exit_pct: 0.5,
                    partial_target_atr: 1.5,
                },
                risk: RiskParams {
                    risk_per_trade_pct: 1.0,
                    max_position_size: 2.0,
                    size_precision: 2,
                    max_daily_loss_pct: 3.0,
                    max_daily_trades: 15,
                    max_consecutive_losses: 3,
                    reset_streak_daily: false,
                    cooldown_bars: 2,
                    cooldown_policy: CooldownPolicy::AfterLoss,
                },
                session: SessionParams {
                    trade_24_7: true,
                    session_start_hour: 0,
                    session_end_hour: 23,
                    avoid_low_volume_hours: false,
                    low_volume_start_hour: 0,
                    low_volume_end_hour: 4,
                    avoid_first_minutes: 0,
                    avoid_last_minutes: 0,
                },
            },
            StrategyPreset::Scalper1m => StrategyConfig {
                preset: self,
                indicators: IndicatorParams {
                    fast_ema: 5,
                    medium_ema: 13,
                    slow_ema: 50,
                    rsi_period: 14,
                    macd_fast: 12,
                    macd_slow: 26,
                    macd_signal: 9,
                    bb_period: 20,
                    bb_dev: 2.0,
                    atr_period: 14,
                    adx_period: 14,
                    volume_ma_period: 20,
                },
                entry: EntryParams {
                    rsi_overbought: 65.0,
                    rsi_oversold: 35.0,
                    rsi_midline: 50.0,
                    rsi_neutral_low: 45.0,
                    rsi_neutral_high: 55.0,
                    require_macd_agreement: true,
                    macd_zero_line: true,
                    enable_macd_rule: false,
                    allow_bb_breakout: false,
                    require_bb_pullback: true,
                    require_trend: false,
                    min_trend_strength: 0.15,
                    require_adx: true,
                    adx_threshold: 20.0,
                    require_volume_surge: true,
                    volume_surge_multiplier: 1.3,
                },
                exits: ExitParams {
                    atr_stop_multiplier: 1.5,
                    atr_target_multiplier: 2.5,
                    use_breakeven: true,
                    breakeven_multiplier: 1.0,
                    breakeven_buffer_atr: 0.1,
                    use_trailing_stop: true,
                    trailing_activation_atr: 1.0,
                    trailing_distance_atr: 1.2,
                    use_partial_exit: true,
                    partial_exit_pct: 0.5,
                    partial_target_atr: 1.5,
                },
                risk: RiskParams {
                    risk_per_trade_pct: 0.5,
                    max_position_size: 1.0,
                    size_precision: 3,
                    max_daily_loss_pct: 2.0,
                    max_daily_trades: 15,
                    max_consecutive_losses: 0,
                    reset_streak_daily: false,
                    cooldown_bars: 2,
                    cooldown_policy: CooldownPolicy::AfterAnyTrade,
                },
                session: SessionParams {
                    trade_24_7: false,
                    session_start_hour: 9,
                    session_end_hour: 16,
                    avoid_low_volume_hours: false,
                    low_volume_start_hour: 0,
                    low_volume_end_hour: 4,
                    avoid_first_minutes: 5,
                    avoid_last_minutes: 5,
                },
            },
        }
    }
}

// ─── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorParams {
    pub fast_ema: usize,
    pub medium_ema: usize,
    /// Trend EMA: the slowest of the stack.
    pub slow_ema: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_dev: f64,
    pub atr_period: usize,
    pub adx_period: usize,
    pub volume_ma_period: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryParams {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_midline: f64,
    /// Lower bound of the long band on the crossover rule.
    pub rsi_neutral_low: f64,
    /// Upper bound of the short band on the crossover rule.
    pub rsi_neutral_high: f64,
    pub require_macd_agreement: bool,
    /// MACD agreement also requires the line on the trade's side of zero.
    pub macd_zero_line: bool,
    /// MACD-line/signal crossover rule.
    pub enable_macd_rule: bool,
    /// Bollinger breakout rule.
    pub allow_bb_breakout: bool,
    /// Crossover entries must sit between the outer band and the middle band.
    pub require_bb_pullback: bool,
    pub require_trend: bool,
    /// Minimum |fast - slow| / close, as a fraction of price.
    pub min_trend_strength: f64,
    pub require_adx: bool,
    pub adx_threshold: f64,
    pub require_volume_surge: bool,
    pub volume_surge_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitParams {
    pub atr_stop_multiplier: f64,
    pub atr_target_multiplier: f64,
    pub use_breakeven: bool,
    pub breakeven_multiplier: f64,
    /// Breakeven stop sits this many ATRs beyond entry in the favorable direction.
    pub breakeven_buffer_atr: f64,
    pub use_trailing_stop: bool,
    pub trailing_activation_atr: f64,
    pub trailing_distance_atr: f64,
    pub use_partial_exit: bool,
    /// Fraction of the remaining size closed at the partial target.
    pub partial_exit_pct: f64,
    pub partial_target_atr: f64,
}

/// When the post-trade cooldown applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Only while a loss streak is running.
    AfterLoss,
    /// After every entry.
    AfterAnyTrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskParams {
    pub risk_per_trade_pct: f64,
    pub max_position_size: f64,
    /// Decimal places of order sizes.
    pub size_precision: u32,
    pub max_daily_loss_pct: f64,
    pub max_daily_trades: u32,
    /// Zero disables the streak veto.
    pub max_consecutive_losses: u32,
    /// Clear the loss streak at each date rollover. Off: a streak veto
    /// holds until a winning close.
    #[serde(default)]
    pub reset_streak_daily: bool,
    pub cooldown_bars: u32,
    pub cooldown_policy: CooldownPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionParams {
    /// Skip the session-hours window entirely.
    pub trade_24_7: bool,
    pub session_start_hour: u32,
    /// Inclusive up to `HH:00:00`.
    pub session_end_hour: u32,
    pub avoid_low_volume_hours: bool,
    pub low_volume_start_hour: u32,
    /// Exclusive.
    pub low_volume_end_hour: u32,
    pub avoid_first_minutes: u32,
    pub avoid_last_minutes: u32,
}

// ─── Config ─────────────────────────────────────────────────────────

/// Validated, immutable strategy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub preset: StrategyPreset,
    pub indicators: IndicatorParams,
    pub entry: EntryParams,
    pub exits: ExitParams,
    pub risk: RiskParams,
    pub session: SessionParams,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyPreset::default().to_config()
    }
}

const SECTIONS: [&str; 5] = ["indicators", "entry", "exits", "risk", "session"];

/// Placeholder values treated as "not provided".
const SENTINELS: [&str; 4] = ["undefined", "null", "none", ""];

impl StrategyConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse, migrate, overlay onto the preset defaults, and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut raw: Table = content.parse()?;

        let preset = match raw.remove("preset") {
            Some(Value::String(name)) if !is_sentinel(&name) => StrategyPreset::from_name(&name)?,
            Some(Value::String(_)) | None => StrategyPreset::default(),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    field: "preset",
                    reason: format!("expected a string, got {other}"),
                })
            }
        };

        migrate_aliases(&mut raw, preset)?;
        strip_sentinels(&mut raw);

        let mut merged = Value::try_from(preset.to_config())?;
        if let Value::Table(base) = &mut merged {
            overlay(base, raw);
        }
        let config: StrategyConfig = merged.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Bars required before any entry can be evaluated.
    pub fn min_lookback(&self) -> usize {
        let p = &self.indicators;
        let mut longest = [
            p.fast_ema,
            p.medium_ema,
            p.slow_ema,
            p.rsi_period + 1,
            p.macd_slow + p.macd_signal - 1,
            p.bb_period,
            p.atr_period + 1,
            p.volume_ma_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if self.entry.require_adx {
            longest = longest.max(2 * p.adx_period + 1);
        }
        longest
    }

    /// Reject non-positive periods, inverted bounds and out-of-range percentages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.indicators;
        for (field, value) in [
            ("indicators.fast_ema", p.fast_ema),
            ("indicators.medium_ema", p.medium_ema),
            ("indicators.slow_ema", p.slow_ema),
            ("indicators.rsi_period", p.rsi_period),
            ("indicators.macd_fast", p.macd_fast),
            ("indicators.macd_slow", p.macd_slow),
            ("indicators.macd_signal", p.macd_signal),
            ("indicators.bb_period", p.bb_period),
            ("indicators.atr_period", p.atr_period),
            ("indicators.adx_period", p.adx_period),
            ("indicators.volume_ma_period", p.volume_ma_period),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositive { field, value: 0.0 });
            }
        }
        if !(p.fast_ema < p.medium_ema && p.medium_ema < p.slow_ema) {
            return Err(ConfigError::Invalid {
                field: "indicators",
                reason: format!(
                    "EMA periods must satisfy fast < medium < slow, got {}/{}/{}",
                    p.fast_ema, p.medium_ema, p.slow_ema
                ),
            });
        }
        if p.macd_fast >= p.macd_slow {
            return Err(ConfigError::Invalid {
                field: "indicators.macd_fast",
                reason: format!("must be below macd_slow ({})", p.macd_slow),
            });
        }
        require_positive("indicators.bb_dev", p.bb_dev)?;

        let e = &self.entry;
        for (field, value) in [
            ("entry.rsi_overbought", e.rsi_overbought),
            ("entry.rsi_oversold", e.rsi_oversold),
            ("entry.rsi_midline", e.rsi_midline),
            ("entry.rsi_neutral_low", e.rsi_neutral_low),
            ("entry.rsi_neutral_high", e.rsi_neutral_high),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("RSI bound {value} outside 0..=100"),
                });
            }
        }
        if e.rsi_oversold >= e.rsi_overbought {
            return Err(ConfigError::Invalid {
                field: "entry.rsi_oversold",
                reason: format!(
                    "must be below rsi_overbought ({} >= {})",
                    e.rsi_oversold, e.rsi_overbought
                ),
            });
        }
        if e.require_trend {
            require_positive("entry.min_trend_strength", e.min_trend_strength)?;
        }
        if e.require_volume_surge {
            require_positive("entry.volume_surge_multiplier", e.volume_surge_multiplier)?;
        }

        let x = &self.exits;
        require_positive("exits.atr_stop_multiplier", x.atr_stop_multiplier)?;
        require_positive("exits.atr_target_multiplier", x.atr_target_multiplier)?;
        if x.use_breakeven {
            require_positive("exits.breakeven_multiplier", x.breakeven_multiplier)?;
            if x.breakeven_buffer_atr < 0.0 {
                return Err(ConfigError::Invalid {
                    field: "exits.breakeven_buffer_atr",
                    reason: format!("must not be negative, got {}", x.breakeven_buffer_atr),
                });
            }
        }
        if x.use_trailing_stop {
            require_positive("exits.trailing_activation_atr", x.trailing_activation_atr)?;
            require_positive("exits.trailing_distance_atr", x.trailing_distance_atr)?;
        }
        if x.use_partial_exit {
            if !(x.partial_exit_pct > 0.0 && x.partial_exit_pct < 1.0) {
                return Err(ConfigError::Invalid {
                    field: "exits.partial_exit_pct",
                    reason: format!("must be a fraction in (0, 1), got {}", x.partial_exit_pct),
                });
            }
            require_positive("exits.partial_target_atr", x.partial_target_atr)?;
        }

        let r = &self.risk;
        require_percent("risk.risk_per_trade_pct", r.risk_per_trade_pct)?;
        require_percent("risk.max_daily_loss_pct", r.max_daily_loss_pct)?;
        if r.max_position_size < crate::domain::MIN_ORDER_SIZE {
            return Err(ConfigError::Invalid {
                field: "risk.max_position_size",
                reason: format!(
                    "must be at least the minimum order size {}, got {}",
                    crate::domain::MIN_ORDER_SIZE,
                    r.max_position_size
                ),
            });
        }
        if r.size_precision < 2 || r.size_precision > 8 {
            return Err(ConfigError::Invalid {
                field: "risk.size_precision",
                reason: format!("must be in 2..=8, got {}", r.size_precision),
            });
        }
        if r.max_daily_trades == 0 {
            return Err(ConfigError::NonPositive {
                field: "risk.max_daily_trades",
                value: 0.0,
            });
        }

        let s = &self.session;
        for (field, hour) in [
            ("session.session_start_hour", s.session_start_hour),
            ("session.session_end_hour", s.session_end_hour),
            ("session.low_volume_start_hour", s.low_volume_start_hour),
            ("session.low_volume_end_hour", s.low_volume_end_hour),
        ] {
            if hour > 23 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("hour {hour} outside 0..=23"),
                });
            }
        }
        for (field, minutes) in [
            ("session.avoid_first_minutes", s.avoid_first_minutes),
            ("session.avoid_last_minutes", s.avoid_last_minutes),
        ] {
            if minutes > 59 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{minutes} minutes outside 0..=59"),
                });
            }
        }
        if s.avoid_first_minutes.saturating_add(s.avoid_last_minutes) >= 60 {
            return Err(ConfigError::Invalid {
                field: "session.avoid_first_minutes",
                reason: "first and last minute windows cover the whole hour".into(),
            });
        }
        Ok(())
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn require_percent(field: &'static str, value: f64) -> Result<(), ConfigError> {
    require_positive(field, value)?;
    if value > 100.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("percentage {value} above 100"),
        });
    }
    Ok(())
}

fn is_sentinel(s: &str) -> bool {
    SENTINELS.contains(&s.trim().to_ascii_lowercase().as_str())
}

// ─── Migration ──────────────────────────────────────────────────────

/// Resolve a flat or legacy parameter name to its canonical `(section, field)`.
fn canonical_key(key: &str, preset: StrategyPreset) -> Option<(&'static str, &'static str)> {
    // The one-minute variant names its middle EMA "slow" and its trend EMA "trend".
    if preset == StrategyPreset::Scalper1m {
        match key {
            "slow_ema_period" => return Some(("indicators", "medium_ema")),
            "trend_ema_period" => return Some(("indicators", "slow_ema")),
            _ => {}
        }
    }
    let mapped = match key {
        "fast_ema" | "fast_ema_period" => ("indicators", "fast_ema"),
        "medium_ema" | "medium_ema_period" => ("indicators", "medium_ema"),
        "slow_ema" | "slow_ema_period" | "trend_ema_period" => ("indicators", "slow_ema"),
        "rsi_period" => ("indicators", "rsi_period"),
        "macd_fast" => ("indicators", "macd_fast"),
        "macd_slow" => ("indicators", "macd_slow"),
        "macd_signal" => ("indicators", "macd_signal"),
        "bb_period" => ("indicators", "bb_period"),
        "bb_dev" => ("indicators", "bb_dev"),
        "atr_period" => ("indicators", "atr_period"),
        "adx_period" => ("indicators", "adx_period"),
        "volume_ma_period" | "volume_period" => ("indicators", "volume_ma_period"),

        "rsi_overbought" => ("entry", "rsi_overbought"),
        "rsi_oversold" => ("entry", "rsi_oversold"),
        "rsi_midline" => ("entry", "rsi_midline"),
        "rsi_neutral_low" => ("entry", "rsi_neutral_low"),
        "rsi_neutral_high" => ("entry", "rsi_neutral_high"),
        "require_macd_agreement" | "use_macd_confirmation" => ("entry", "require_macd_agreement"),
        "macd_zero_line" => ("entry", "macd_zero_line"),
        "enable_macd_rule" => ("entry", "enable_macd_rule"),
        "allow_bb_breakout" => ("entry", "allow_bb_breakout"),
        "require_bb_pullback" | "use_bb_filter" => ("entry", "require_bb_pullback"),
        "require_trend" => ("entry", "require_trend"),
        "min_trend_strength" => ("entry", "min_trend_strength"),
        "require_adx" => ("entry", "require_adx"),
        "adx_threshold" => ("entry", "adx_threshold"),
        "require_volume_surge" | "use_volume_filter" | "require_volume_spike" => {
            ("entry", "require_volume_surge")
        }
        "volume_surge_multiplier" | "volume_threshold" => ("entry", "volume_surge_multiplier"),

        "atr_stop_multiplier" => ("exits", "atr_stop_multiplier"),
        "atr_target_multiplier" => ("exits", "atr_target_multiplier"),
        "use_breakeven" => ("exits", "use_breakeven"),
        "breakeven_multiplier" | "atr_breakeven_multiplier" => ("exits", "breakeven_multiplier"),
        "breakeven_buffer_atr" => ("exits", "breakeven_buffer_atr"),
        "use_trailing_stop" => ("exits", "use_trailing_stop"),
        "trailing_activation_atr" | "trailing_stop_activation" => {
            ("exits", "trailing_activation_atr")
        }
        "trailing_distance_atr" | "trailing_stop_distance" => ("exits", "trailing_distance_atr"),
        "use_partial_exit" | "use_partial_exits" => ("exits", "use_partial_exit"),
        "partial_exit_pct" | "partial_exit_percent" => ("exits", "partial_exit_pct"),
        "partial_target_atr" | "partial_exit_atr" => ("exits", "partial_target_atr"),

        "risk_per_trade_pct" | "risk_per_trade" => ("risk", "risk_per_trade_pct"),
        "max_position_size" => ("risk", "max_position_size"),
        "size_precision" => ("risk", "size_precision"),
        "max_daily_loss_pct" | "max_daily_drawdown_pct" => ("risk", "max_daily_loss_pct"),
        "max_daily_trades" => ("risk", "max_daily_trades"),
        "max_consecutive_losses" => ("risk", "max_consecutive_losses"),
        "cooldown_bars" | "cooldown_after_loss" => ("risk", "cooldown_bars"),
        "cooldown_policy" => ("risk", "cooldown_policy"),

        "trade_24_7" | "trade_24h" => ("session", "trade_24_7"),
        "session_start_hour" | "session_start" => ("session", "session_start_hour"),
        "session_end_hour" | "session_end" => ("session", "session_end_hour"),
        "avoid_low_volume_hours" => ("session", "avoid_low_volume_hours"),
        "low_volume_start_hour" | "low_volume_start" => ("session", "low_volume_start_hour"),
        "low_volume_end_hour" | "low_volume_end" => ("session", "low_volume_end_hour"),
        "avoid_first_minutes" => ("session", "avoid_first_minutes"),
        "avoid_last_minutes" => ("session", "avoid_last_minutes"),
        _ => return None,
    };
    Some(mapped)
}

/// Move flat and aliased keys to their canonical section field.
///
/// When both an alias and its canonical field are set, the canonical
/// value is kept and the alias dropped with a warning.
fn migrate_aliases(raw: &mut Table, preset: StrategyPreset) -> Result<(), ConfigError> {
    let mut pending: Vec<(&'static str, &'static str, String, Value)> = Vec::new();

    let top_keys: Vec<String> = raw
        .keys()
        .filter(|k| !SECTIONS.contains(&k.as_str()))
        .cloned()
        .collect();
    for key in top_keys {
        let (section, field) =
            canonical_key(&key, preset).ok_or_else(|| ConfigError::UnknownKey(key.clone()))?;
        if let Some(value) = raw.remove(&key) {
            pending.push((section, field, key, value));
        }
    }

    for section in SECTIONS {
        let Some(Value::Table(table)) = raw.get_mut(section) else {
            continue;
        };
        let keys: Vec<String> = table.keys().cloned().collect();
        for key in keys {
            match canonical_key(&key, preset) {
                Some((target, field)) if target == section && field == key => {}
                Some((target, field)) => {
                    if let Some(value) = table.remove(&key) {
                        pending.push((target, field, format!("{section}.{key}"), value));
                    }
                }
                None => return Err(ConfigError::UnknownKey(format!("{section}.{key}"))),
            }
        }
    }

    for (section, field, from, value) in pending {
        let entry = raw
            .entry(section.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        let Value::Table(table) = entry else {
            return Err(ConfigError::Invalid {
                field: "config",
                reason: format!("'{section}' must be a table"),
            });
        };
        if table.contains_key(field) {
            warn!(alias = %from, canonical = %format!("{section}.{field}"), "alias ignored, canonical field already set");
        } else {
            debug!(alias = %from, canonical = %format!("{section}.{field}"), "migrated config alias");
            table.insert(field.to_string(), value);
        }
    }
    Ok(())
}

/// Drop placeholder strings so the preset default applies.
fn strip_sentinels(raw: &mut Table) {
    for section in SECTIONS {
        if let Some(Value::Table(table)) = raw.get_mut(section) {
            let placeholders: Vec<String> = table
                .iter()
                .filter(|(_, value)| matches!(value, Value::String(s) if is_sentinel(s)))
                .map(|(key, _)| key.clone())
                .collect();
            for key in placeholders {
                debug!(field = %format!("{section}.{key}"), "placeholder value resolved to default");
                table.remove(&key);
            }
        }
    }
}

/// Recursively overwrite `base` with the values present in `overrides`.
fn overlay(base: &mut Table, overrides: Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => overlay(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_high_roi_default() {
        let config = StrategyConfig::from_toml("").unwrap();
        assert_eq!(config, StrategyPreset::HighRoi.to_config());
    }

    #[test]
    fn presets_validate() {
        for preset in StrategyPreset::ALL {
            preset.to_config().validate().unwrap();
        }
    }

    #[test]
    fn preset_selects_base_and_sections_override() {
        let config = StrategyConfig::from_toml(
            r#"
preset = "scalper_1m"

[risk]
max_daily_trades = 5
"#,
        )
        .unwrap();
        assert_eq!(config.preset, StrategyPreset::Scalper1m);
        assert_eq!(config.risk.max_daily_trades, 5);
        assert_eq!(config.indicators.slow_ema, 50);
        assert!(config.entry.require_adx);
    }

    #[test]
    fn legacy_flat_aliases_migrate() {
        let config = StrategyConfig::from_toml(
            r#"
fast_ema_period = 7
trailing_stop_activation = 1.2
trailing_stop_distance = 0.9
max_daily_drawdown_pct = 4.0
cooldown_bars = 3
volume_threshold = 1.8
"#,
        )
        .unwrap();
        assert_eq!(config.indicators.fast_ema, 7);
        assert_eq!(config.exits.trailing_activation_atr, 1.2);
        assert_eq!(config.exits.trailing_distance_atr, 0.9);
        assert_eq!(config.risk.max_daily_loss_pct, 4.0);
        assert_eq!(config.risk.cooldown_bars, 3);
        assert_eq!(config.entry.volume_surge_multiplier, 1.8);
    }

    #[test]
    fn canonical_wins_over_alias() {
        let config = StrategyConfig::from_toml(
            r#"
cooldown_after_loss = 9

[risk]
cooldown_bars = 4
"#,
        )
        .unwrap();
        assert_eq!(config.risk.cooldown_bars, 4);
    }

    #[test]
    fn scalper_legacy_ema_names_map_to_stack() {
        let config = StrategyConfig::from_toml(
            r#"
preset = "scalper_1m"
slow_ema_period = 17
trend_ema_period = 60
"#,
        )
        .unwrap();
        assert_eq!(config.indicators.medium_ema, 17);
        assert_eq!(config.indicators.slow_ema, 60);
    }

    #[test]
    fn undefined_sentinels_resolve_to_defaults() {
        let config = StrategyConfig::from_toml(
            r#"
atr_stop_multiplier = "undefined"

[risk]
max_position_size = ""
"#,
        )
        .unwrap();
        let defaults = StrategyPreset::HighRoi.to_config();
        assert_eq!(config.exits.atr_stop_multiplier, defaults.exits.atr_stop_multiplier);
        assert_eq!(config.risk.max_position_size, defaults.risk.max_position_size);
    }

    #[test]
    fn unknown_key_rejected() {
        let err = StrategyConfig::from_toml("not_a_param = 1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(k) if k == "not_a_param"));
    }

    #[test]
    fn unknown_preset_rejected() {
        let err = StrategyConfig::from_toml(r#"preset = "swing""#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset(_)));
    }

    #[test]
    fn zero_period_rejected() {
        let err = StrategyConfig::from_toml("[indicators]\natr_period = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonPositive {
                field: "indicators.atr_period",
                ..
            }
        ));
    }

    #[test]
    fn unordered_ema_stack_rejected() {
        let err = StrategyConfig::from_toml("[indicators]\nfast_ema = 30").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "indicators", .. }));
    }

    #[test]
    fn inverted_rsi_bounds_rejected() {
        let err = StrategyConfig::from_toml("[entry]\nrsi_oversold = 80.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn oversized_minute_window_rejected() {
        let err = StrategyConfig::from_toml(
            "[session]\navoid_first_minutes = 4294967295\navoid_last_minutes = 1",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "session.avoid_first_minutes",
                ..
            }
        ));

        let err = StrategyConfig::from_toml("[session]\navoid_last_minutes = 60").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "session.avoid_last_minutes",
                ..
            }
        ));
    }

    #[test]
    fn integer_accepted_for_float_field() {
        let config = StrategyConfig::from_toml("[exits]\natr_stop_multiplier = 2").unwrap();
        assert_eq!(config.exits.atr_stop_multiplier, 2.0);
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let original = StrategyPreset::Scalper1m.to_config();
        let text = original.to_toml_string().unwrap();
        let parsed = StrategyConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn min_lookback_covers_macd_and_adx() {
        let high_roi = StrategyPreset::HighRoi.to_config();
        assert_eq!(high_roi.min_lookback(), 34);
        let scalper = StrategyPreset::Scalper1m.to_config();
        assert_eq!(scalper.min_lookback(), 50);
    }
}
