use std::time::Duration;

use serde::Deserialize;

/// Per-upstream circuit breaker policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerConfig {
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    #[serde(default = "default_window")]
    pub window: String,
    #[serde(default = "default_recovery")]
    pub recovery: String,
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: default_error_threshold(),
            window: default_window(),
            recovery: default_recovery(),
            half_open_max_calls: default_half_open_max_calls(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl BreakerConfig {
    /// # Errors
    ///
    /// Returns an error if `window` is not a valid duration string.
    pub fn window_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("breaker.window", &self.window)
    }

    /// # Errors
    ///
    /// Returns an error if `recovery` is not a valid duration string.
    pub fn recovery_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("breaker.recovery", &self.recovery)
    }
}

const fn default_error_threshold() -> u32 {
    5
}

fn default_window() -> String {
    "60s".to_string()
}

fn default_recovery() -> String {
    "30s".to_string()
}

const fn default_half_open_max_calls() -> u32 {
    1
}

const fn default_success_threshold() -> u32 {
    1
}
