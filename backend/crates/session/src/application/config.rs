//! Application Configuration
//!
//! Idle-timeout thresholds for the session manager.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Environment variable for the idle timeout (seconds)
pub const ENV_IDLE_TIMEOUT: &str = "SESSION_IDLE_TIMEOUT_SECS";
/// Environment variable for the warning window (seconds)
pub const ENV_WARNING_WINDOW: &str = "SESSION_WARNING_WINDOW_SECS";
/// Environment variable for the idle check interval (seconds)
pub const ENV_CHECK_INTERVAL: &str = "SESSION_CHECK_INTERVAL_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds (got {value:?})")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("warning window must be shorter than the idle timeout")]
    WarningWindowTooLong,

    #[error("check interval must be shorter than the warning window")]
    CheckIntervalTooLong,
}

/// Session manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Inactivity after which the session is force-closed (30 minutes)
    pub idle_timeout: Duration,
    /// Trailing part of the timeout during which the warning is raised (5 minutes)
    pub warning_window: Duration,
    /// Period of the idle check (60 seconds)
    pub check_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            warning_window: Duration::from_secs(5 * 60),
            check_interval: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Short timings for trying the flow by hand
    pub fn development() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
            warning_window: Duration::from_secs(30),
            check_interval: Duration::from_secs(5),
        }
    }

    /// Defaults overridden by `SESSION_*_SECS` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            idle_timeout: read_secs(ENV_IDLE_TIMEOUT)?.unwrap_or(defaults.idle_timeout),
            warning_window: read_secs(ENV_WARNING_WINDOW)?.unwrap_or(defaults.warning_window),
            check_interval: read_secs(ENV_CHECK_INTERVAL)?.unwrap_or(defaults.check_interval),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Zero("idle timeout"));
        }
        if self.warning_window.is_zero() {
            return Err(ConfigError::Zero("warning window"));
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::Zero("check interval"));
        }
        if self.warning_window >= self.idle_timeout {
            return Err(ConfigError::WarningWindowTooLong);
        }
        if self.check_interval >= self.warning_window {
            return Err(ConfigError::CheckIntervalTooLong);
        }
        Ok(())
    }

    /// Idle time at which the warning is raised
    #[inline]
    pub fn warning_threshold(&self) -> Duration {
        self.idle_timeout.saturating_sub(self.warning_window)
    }
}

fn read_secs(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(None),
    }
}
