use std::time::Duration;

use serde::Deserialize;

/// Router retry/timeout policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_call_timeout")]
    pub call_timeout: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            call_timeout: default_call_timeout(),
        }
    }
}

impl RouterConfig {
    /// # Errors
    ///
    /// Returns an error if `call_timeout` is not a valid duration string.
    pub fn call_timeout_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("router.call_timeout", &self.call_timeout)
    }
}

const fn default_max_attempts() -> u32 {
    3
}

fn default_call_timeout() -> String {
    "30s".to_string()
}
