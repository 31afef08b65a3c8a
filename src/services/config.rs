//! Engine configuration.
//!
//! Hierarchical loading via figment: programmatic defaults, then
//! `.fortuna/config.yaml`, then `.fortuna/local.yaml`, then
//! `FORTUNA_`-prefixed environment variables.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{BudgetTier, PressureTier, PPM};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid busy_timeout_secs: {0}. Must be between 1 and 300")]
    InvalidBusyTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid pity threshold: {0}. Cannot be 0")]
    InvalidPityThreshold(u32),

    #[error("Invalid draw deadline: {0}s. Must be between 1 and 60")]
    InvalidDeadline(u64),

    #[error("in_flight TTL ({0}s) must exceed the draw deadline ({1}s)")]
    InFlightTtlTooShort(u64, u64),

    #[error("Invalid multiplier {value} ppm for {field}")]
    InvalidMultiplier { field: &'static str, value: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub draw: DrawConfig,
    pub corrections: CorrectionsConfig,
    pub pressure: PressureConfig,
    pub outbox: OutboxConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            draw: DrawConfig::default(),
            corrections: CorrectionsConfig::default(),
            pressure: PressureConfig::default(),
            outbox: OutboxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    /// SQLite busy handler and pool acquire wait, seconds.
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: ".fortuna/fortuna.db".to_string(), max_connections: 5, busy_timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
    /// Optional log file; stderr when unset.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string(), file: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Total per-draw deadline.
    pub deadline_secs: u64,
    /// Lock acquisition wait bound, part of the deadline.
    pub lock_wait_ms: u64,
    /// Lock TTL while held; renewed by long executions.
    pub lock_ttl_secs: u64,
    /// in_flight idempotency reservation TTL; slightly exceeds the
    /// deadline so a late duplicate sees IN_PROGRESS, not a fresh run.
    pub in_flight_ttl_secs: u64,
    /// Committed response retention.
    pub response_ttl_secs: u64,
    /// How long a duplicate waits for the first flight before giving
    /// up with IN_PROGRESS.
    pub duplicate_wait_ms: u64,
    /// Daily quota applied when no quota rule matches.
    pub default_daily_quota: u32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 3,
            lock_wait_ms: 1500,
            lock_ttl_secs: 10,
            in_flight_ttl_secs: 5,
            response_ttl_secs: 24 * 3600,
            duplicate_wait_ms: 800,
            default_daily_quota: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionsConfig {
    pub pity: PityConfig,
    pub anti_empty: AntiEmptyConfig,
    pub anti_high: AntiHighConfig,
    pub luck_debt: LuckDebtConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PityConfig {
    /// Empty streak at which the system guarantee fires.
    pub threshold: u32,
}

impl Default for PityConfig {
    fn default() -> Self {
        Self { threshold: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiEmptyConfig {
    /// Empty streak at which weights start shifting.
    pub threshold: u32,
    /// Fallback-tier multiplier while active.
    pub fallback_multiplier_ppm: u64,
    /// High/mid-tier multiplier while active.
    pub boost_multiplier_ppm: u64,
}

impl Default for AntiEmptyConfig {
    fn default() -> Self {
        Self { threshold: 3, fallback_multiplier_ppm: 500_000, boost_multiplier_ppm: 1_500_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiHighConfig {
    /// Consecutive high wins that arm the cooldown.
    pub threshold: u32,
    /// Draws the cooldown lasts once armed.
    pub cooldown_rounds: u32,
    /// High-tier multiplier while cooling.
    pub dampen_multiplier_ppm: u64,
}

impl Default for AntiHighConfig {
    fn default() -> Self {
        Self { threshold: 2, cooldown_rounds: 3, dampen_multiplier_ppm: 200_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuckDebtConfig {
    /// EMA step per draw, ppm.
    pub alpha_ppm: u64,
    /// Empty-rate target; debt accrues above it, ppm.
    pub target_empty_rate_ppm: u64,
    /// Multiplier slope per ppm of excess empty rate, ppm.
    pub slope_ppm: u64,
    /// Multiplier ceiling, ppm.
    pub max_multiplier_ppm: u64,
}

impl Default for LuckDebtConfig {
    fn default() -> Self {
        Self {
            alpha_ppm: 50_000,
            target_empty_rate_ppm: 700_000,
            slope_ppm: 2_000_000,
            max_multiplier_ppm: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// Snapshot cache validity.
    pub snapshot_staleness_secs: u64,
    /// Active pricing cache validity.
    pub pricing_staleness_secs: u64,
    /// Trailing window for the actual spend rate, hours.
    pub spend_window_hours: u32,
    /// Campaign duration assumed when no end date is set, hours.
    pub default_horizon_hours: u32,
    /// B x P matrix; missing cells fall back to neutral.
    pub matrix: Vec<PressureCellConfig>,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            snapshot_staleness_secs: 60,
            pricing_staleness_secs: 30,
            spend_window_hours: 1,
            default_horizon_hours: 7 * 24,
            matrix: default_matrix(),
        }
    }
}

/// One cell of the B x P matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureCellConfig {
    pub budget_tier: BudgetTier,
    pub pressure_tier: PressureTier,
    /// Scales the fallback tier's base weight.
    pub empty_weight_multiplier_ppm: u64,
    /// Ceiling on any composed correction multiplier.
    pub cap_multiplier_ppm: u64,
}

/// Defaults: generous caps while the budget is healthy, fallback
/// weight climbing as budget drains or spend runs hot.
fn default_matrix() -> Vec<PressureCellConfig> {
    let cell = |b, p, empty, cap| PressureCellConfig {
        budget_tier: b,
        pressure_tier: p,
        empty_weight_multiplier_ppm: empty,
        cap_multiplier_ppm: cap,
    };
    vec![
        cell(BudgetTier::B3, PressureTier::P0, 1_000_000, 3_000_000),
        cell(BudgetTier::B3, PressureTier::P1, 1_000_000, 2_500_000),
        cell(BudgetTier::B3, PressureTier::P2, 1_200_000, 2_000_000),
        cell(BudgetTier::B2, PressureTier::P0, 1_000_000, 2_500_000),
        cell(BudgetTier::B2, PressureTier::P1, 1_100_000, 2_000_000),
        cell(BudgetTier::B2, PressureTier::P2, 1_300_000, 1_800_000),
        cell(BudgetTier::B1, PressureTier::P0, 1_100_000, 2_000_000),
        cell(BudgetTier::B1, PressureTier::P1, 1_300_000, 1_500_000),
        cell(BudgetTier::B1, PressureTier::P2, 1_600_000, 1_300_000),
        cell(BudgetTier::B0, PressureTier::P0, 1_500_000, 1_500_000),
        cell(BudgetTier::B0, PressureTier::P1, 1_800_000, 1_200_000),
        cell(BudgetTier::B0, PressureTier::P2, 2_500_000, 1_000_000),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    pub batch_size: u32,
    pub max_attempts: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self { batch_size: 50, max_attempts: 8, base_backoff_secs: 30, max_backoff_secs: 3600 }
    }
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(".fortuna/config.yaml"))
            .merge(Yaml::file(".fortuna/local.yaml"))
            .merge(Env::prefixed("FORTUNA_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }
        if config.database.busy_timeout_secs == 0 || config.database.busy_timeout_secs > 300 {
            return Err(ConfigError::InvalidBusyTimeout(config.database.busy_timeout_secs));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if !["json", "pretty"].contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.corrections.pity.threshold == 0 {
            return Err(ConfigError::InvalidPityThreshold(0));
        }
        if config.draw.deadline_secs == 0 || config.draw.deadline_secs > 60 {
            return Err(ConfigError::InvalidDeadline(config.draw.deadline_secs));
        }
        if config.draw.in_flight_ttl_secs <= config.draw.deadline_secs {
            return Err(ConfigError::InFlightTtlTooShort(
                config.draw.in_flight_ttl_secs,
                config.draw.deadline_secs,
            ));
        }

        if config.corrections.luck_debt.max_multiplier_ppm < PPM {
            return Err(ConfigError::InvalidMultiplier {
                field: "luck_debt.max_multiplier_ppm",
                value: config.corrections.luck_debt.max_multiplier_ppm,
            });
        }
        if config.corrections.anti_empty.fallback_multiplier_ppm > PPM {
            return Err(ConfigError::InvalidMultiplier {
                field: "anti_empty.fallback_multiplier_ppm",
                value: config.corrections.anti_empty.fallback_multiplier_ppm,
            });
        }
        if config.corrections.anti_high.dampen_multiplier_ppm > PPM {
            return Err(ConfigError::InvalidMultiplier {
                field: "anti_high.dampen_multiplier_ppm",
                value: config.corrections.anti_high.dampen_multiplier_ppm,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ConfigLoader::validate(&EngineConfig::default()).unwrap();
    }

    #[test]
    fn in_flight_ttl_must_exceed_deadline() {
        let mut config = EngineConfig::default();
        config.draw.deadline_secs = 5;
        config.draw.in_flight_ttl_secs = 5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InFlightTtlTooShort(5, 5))
        ));
    }

    #[test]
    fn default_matrix_covers_all_cells() {
        let config = PressureConfig::default();
        for b in BudgetTier::ALL {
            for p in PressureTier::ALL {
                assert!(
                    config
                        .matrix
                        .iter()
                        .any(|c| c.budget_tier == b && c.pressure_tier == p),
                    "missing cell {b:?}x{p:?}"
                );
            }
        }
    }

    #[test]
    fn zero_pity_threshold_rejected() {
        let mut config = EngineConfig::default();
        config.corrections.pity.threshold = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
