use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Upper bound for every duration setting. Keeps deadline arithmetic in range.
pub const MAX_DURATION_S: u64 = 86_400;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tracking.desired_accuracy_m must be a finite value >= 0 (got {0})")]
    DesiredAccuracy(f64),
    #[error("tracking.max_fix_age_s must be finite, > 0 and <= 86400 (got {0})")]
    MaxFixAge(f64),
    #[error("tracking.timeout_s must be in 1..=86400 (got {0})")]
    Timeout(u64),
    #[error("tracking.restart_after_s must be in 1..=86400 (got {0})")]
    RestartAfter(u64),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Accuracy (metres) at which a fix counts as the best-effort location.
    pub desired_accuracy_m: f64,

    /// Fixes older than this on arrival are treated as cached.
    pub max_fix_age_s: f64,

    /// How long one tracking period may run before the source is stopped.
    pub timeout_s: u64,

    /// How long the source stays off before tracking resumes.
    pub restart_after_s: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            desired_accuracy_m: 10.0,
            max_fix_age_s: 5.0,
            timeout_s: 30,
            restart_after_s: 60,
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.desired_accuracy_m.is_finite() || self.desired_accuracy_m < 0.0 {
            return Err(ConfigError::DesiredAccuracy(self.desired_accuracy_m));
        }
        let age = self.max_fix_age_s;
        if !age.is_finite() || age <= 0.0 || age > MAX_DURATION_S as f64 {
            return Err(ConfigError::MaxFixAge(age));
        }
        if !(1..=MAX_DURATION_S).contains(&self.timeout_s) {
            return Err(ConfigError::Timeout(self.timeout_s));
        }
        if !(1..=MAX_DURATION_S).contains(&self.restart_after_s) {
            return Err(ConfigError::RestartAfter(self.restart_after_s));
        }
        Ok(())
    }

    pub fn max_fix_age(&self) -> time::Duration {
        time::Duration::seconds_f64(self.max_fix_age_s)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }

    pub fn restart_after(&self) -> Duration {
        Duration::from_secs(self.restart_after_s)
    }
}
