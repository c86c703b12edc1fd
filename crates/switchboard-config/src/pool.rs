use std::time::Duration;

use serde::Deserialize;

/// Per-upstream connection pool policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    #[serde(default = "default_stream_read_timeout")]
    pub stream_read_timeout: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            stream_read_timeout: default_stream_read_timeout(),
        }
    }
}

impl PoolConfig {
    /// # Errors
    ///
    /// Returns an error if `connect_timeout` is not a valid duration string.
    pub fn connect_timeout_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("pool.connect_timeout", &self.connect_timeout)
    }

    /// # Errors
    ///
    /// Returns an error if `request_timeout` is not a valid duration string.
    pub fn request_timeout_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("pool.request_timeout", &self.request_timeout)
    }

    /// # Errors
    ///
    /// Returns an error if `stream_read_timeout` is not a valid duration string.
    pub fn stream_read_timeout_duration(&self) -> anyhow::Result<Duration> {
        crate::duration::parse("pool.stream_read_timeout", &self.stream_read_timeout)
    }
}

const fn default_max_connections() -> usize {
    64
}

fn default_connect_timeout() -> String {
    "5s".to_string()
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_stream_read_timeout() -> String {
    "300s".to_string()
}
