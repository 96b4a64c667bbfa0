//! Runtime configuration loading.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cadence_solver::Rational;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime settings: the plan-unit quantum per tick, the wall-clock
/// period of the pacing driver, and the notification channel capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub units_per_tick: Rational,
    pub tick_duration_ms: u64,
    pub channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            units_per_tick: Rational::ONE,
            tick_duration_ms: 1_000,
            channel_capacity: 256,
        }
    }
}

impl RuntimeConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_duration_ms)
    }
}

/// Load and validate runtime configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RuntimeConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &RuntimeConfig) -> Result<(), ConfigError> {
    if !config.units_per_tick.is_positive() || config.units_per_tick.is_infinite() {
        return Err(ConfigError::Invalid(
            "units_per_tick must be a positive finite rational".to_string(),
        ));
    }
    if config.tick_duration_ms == 0 {
        return Err(ConfigError::Invalid(
            "tick_duration_ms must be > 0".to_string(),
        ));
    }
    if config.channel_capacity == 0 {
        return Err(ConfigError::Invalid(
            "channel_capacity must be > 0".to_string(),
        ));
    }
    Ok(())
}
