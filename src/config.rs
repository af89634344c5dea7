//! Runtime configuration
//!
//! Built-in defaults, overridden by the `app_settings` table, overridden
//! by `LEADDESK_*` environment variables.

use anyhow::{bail, Context, Result};
use chrono::Duration;
use std::env;
use std::str::FromStr;

use crate::assign::AssignmentStrategy;
use crate::db::Database;

// Settings keys for database storage
pub const SETTING_STALE_HOURS: &str = "stale_hours";
pub const SETTING_SPECIAL_DECAY_HOURS: &str = "special_decay_hours";
pub const SETTING_INACTIVE_DAYS: &str = "inactive_days";
pub const SETTING_SWEEP_BATCH_SIZE: &str = "sweep_batch_size";
pub const SETTING_SWEEP_INTERVAL_HOURS: &str = "sweep_interval_hours";
pub const SETTING_CLAIM_RETRIES: &str = "claim_retries";
pub const SETTING_BUSY_TIMEOUT_MS: &str = "busy_timeout_ms";
pub const SETTING_STRATEGY: &str = "assignment_strategy";
pub const SETTING_ADMINS_IN_POOL: &str = "admins_in_pool";

pub const SETTING_KEYS: &[&str] = &[
    SETTING_STALE_HOURS,
    SETTING_SPECIAL_DECAY_HOURS,
    SETTING_INACTIVE_DAYS,
    SETTING_SWEEP_BATCH_SIZE,
    SETTING_SWEEP_INTERVAL_HOURS,
    SETTING_CLAIM_RETRIES,
    SETTING_BUSY_TIMEOUT_MS,
    SETTING_STRATEGY,
    SETTING_ADMINS_IN_POOL,
];

/// Environment variable for a settings key, e.g. `LEADDESK_STALE_HOURS`.
pub fn env_var_for(key: &str) -> String {
    format!("LEADDESK_{}", key.to_uppercase())
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Assigned contacts untouched this long are handed to another caller.
    pub stale_after: Duration,
    /// Special contacts without a call this long lose caller and flag.
    pub special_decay_after: Duration,
    /// Pending contacts untouched this long have their caller cleared.
    pub inactive_after: Duration,
    pub sweep_batch_size: u32,
    pub sweep_interval: std::time::Duration,
    /// Rounds of lost claims `request_next` tolerates before giving up.
    pub claim_retries: u32,
    pub busy_timeout: std::time::Duration,
    pub strategy: AssignmentStrategy,
    /// Whether project admins are part of the automatic assignment pool.
    pub admins_in_pool: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stale_after: Duration::hours(24),
            special_decay_after: Duration::hours(72),
            inactive_after: Duration::days(7),
            sweep_batch_size: 200,
            sweep_interval: std::time::Duration::from_secs(6 * 60 * 60),
            claim_retries: 3,
            busy_timeout: std::time::Duration::from_millis(5_000),
            strategy: AssignmentStrategy::LoadBalanced,
            admins_in_pool: false,
        }
    }
}

impl Config {
    /// Load configuration from database settings and environment variables.
    /// Environment variables take precedence over database settings.
    pub fn load(db: &Database) -> Result<Self> {
        Self::load_with(db, |name| env::var(name).ok())
    }

    /// Same as [`Config::load`] with an injectable environment lookup.
    pub fn load_with(db: &Database, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        for key in SETTING_KEYS {
            let value = match lookup(&env_var_for(key)) {
                Some(v) => Some(v),
                None => db.get_setting(key)?,
            };
            if let Some(value) = value {
                config
                    .apply(key, &value)
                    .with_context(|| format!("Invalid value for {}", key))?;
            }
        }

        Ok(config)
    }

    /// Validate and store a setting in the database.
    pub fn store(db: &Database, key: &str, value: &str) -> Result<()> {
        Self::default()
            .apply(key, value)
            .with_context(|| format!("Invalid value for {}", key))?;
        db.set_setting(key, value)
    }

    /// Effective value of a settings key, in the units the key is stored in.
    pub fn value_of(&self, key: &str) -> Option<String> {
        let value = match key {
            SETTING_STALE_HOURS => self.stale_after.num_hours().to_string(),
            SETTING_SPECIAL_DECAY_HOURS => self.special_decay_after.num_hours().to_string(),
            SETTING_INACTIVE_DAYS => self.inactive_after.num_days().to_string(),
            SETTING_SWEEP_BATCH_SIZE => self.sweep_batch_size.to_string(),
            SETTING_SWEEP_INTERVAL_HOURS => (self.sweep_interval.as_secs() / 3600).to_string(),
            SETTING_CLAIM_RETRIES => self.claim_retries.to_string(),
            SETTING_BUSY_TIMEOUT_MS => self.busy_timeout.as_millis().to_string(),
            SETTING_STRATEGY => self.strategy.as_str().to_string(),
            SETTING_ADMINS_IN_POOL => self.admins_in_pool.to_string(),
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            SETTING_STALE_HOURS => self.stale_after = window_hours(value)?,
            SETTING_SPECIAL_DECAY_HOURS => self.special_decay_after = window_hours(value)?,
            SETTING_INACTIVE_DAYS => {
                let days = at_most(positive(value)?, MAX_WINDOW_HOURS / 24)?;
                self.inactive_after = Duration::try_days(days)
                    .ok_or_else(|| anyhow::anyhow!("out of range"))?
            }
            SETTING_SWEEP_BATCH_SIZE => self.sweep_batch_size = positive(value)?,
            SETTING_SWEEP_INTERVAL_HOURS => {
                let hours = at_most(positive::<u64>(value)?, MAX_WINDOW_HOURS as u64)?;
                let secs = hours
                    .checked_mul(3600)
                    .ok_or_else(|| anyhow::anyhow!("out of range"))?;
                self.sweep_interval = std::time::Duration::from_secs(secs)
            }
            SETTING_CLAIM_RETRIES => self.claim_retries = positive(value)?,
            SETTING_BUSY_TIMEOUT_MS => {
                self.busy_timeout = std::time::Duration::from_millis(positive(value)?)
            }
            SETTING_STRATEGY => {
                self.strategy = AssignmentStrategy::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("expected load-balanced or random"))?
            }
            SETTING_ADMINS_IN_POOL => {
                self.admins_in_pool = match value.trim().to_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" => false,
                    _ => bail!("expected true or false"),
                }
            }
            _ => bail!("Unknown setting: {}", key),
        }
        Ok(())
    }
}

/// Upper bound for every time window setting: ten years.
const MAX_WINDOW_HOURS: i64 = 10 * 365 * 24;

fn window_hours(value: &str) -> Result<Duration> {
    let hours = at_most(positive(value)?, MAX_WINDOW_HOURS)?;
    Duration::try_hours(hours).ok_or_else(|| anyhow::anyhow!("out of range"))
}

fn at_most<T: PartialOrd + std::fmt::Display>(value: T, max: T) -> Result<T> {
    if value > max {
        bail!("must be at most {}", max);
    }
    Ok(value)
}

fn positive<T>(value: &str) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let parsed: T = value.trim().parse()?;
    if parsed <= T::default() {
        bail!("must be greater than zero");
    }
    Ok(parsed)
}
