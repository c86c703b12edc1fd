use std::time::Duration;

use serde::Deserialize;

/// Active health-probing policy applied to every registered upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthMonitorConfig {
    #[serde(default = "default_probe_interval")]
    pub probe_interval: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,
    #[serde(default = "default_degraded_after_failures")]
    pub degraded_after_failures: u32,
    #[serde(default = "default_down_after_failures")]
    pub down_after_failures: u32,
    #[serde(default = "default_recovered_after_successes")]
    pub recovered_after_successes: u32,
    #[serde(default = "default_router_failure_quarantine")]
    pub router_failure_quarantine: String,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: default_probe_interval(),
            probe_timeout: default_probe_timeout(),
            degraded_after_failures: default_degraded_after_failures(),
            down_after_failures: default_down_after_failures(),
            recovered_after_successes: default_recovered_after_successes(),
            router_failure_quarantine: default_router_failure_quarantine(),
        }
    }
}

impl HealthMonitorConfig {
    /// # Errors
    ///
    /// Returns an error if `probe_interval` is not a valid duration string.
    pub fn probe_interval_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("health.probe_interval", &self.probe_interval)
    }

    /// # Errors
    ///
    /// Returns an error if `probe_timeout` is not a valid duration string.
    pub fn probe_timeout_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("health.probe_timeout", &self.probe_timeout)
    }

    /// # Errors
    ///
    /// Returns an error if `router_failure_quarantine` is not a valid duration string.
    pub fn router_failure_quarantine_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("health.router_failure_quarantine", &self.router_failure_quarantine)
    }
}

fn default_probe_interval() -> String {
    "10s".to_string()
}

fn default_probe_timeout() -> String {
    "3s".to_string()
}

const fn default_degraded_after_failures() -> u32 {
    1
}

const fn default_down_after_failures() -> u32 {
    3
}

const fn default_recovered_after_successes() -> u32 {
    2
}

fn default_router_failure_quarantine() -> String {
    "5s".to_string()
}
