#![allow(clippy::must_use_candidate)]

pub mod breaker;
pub mod duration;
pub mod engines;
mod env;
pub mod fault;
pub mod health;
pub mod health_monitor;
mod loader;
pub mod pool;
pub mod router;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use breaker::BreakerConfig;
pub use engines::{EngineConfig, EnginesConfig};
pub use env::{apply_engine_env_fallbacks, apply_scalar_env_overrides, expand_env};
pub use fault::FaultConfig;
pub use health::HealthConfig;
pub use health_monitor::HealthMonitorConfig;
pub use pool::PoolConfig;
pub use router::RouterConfig;
pub use server::ServerConfig;
pub use telemetry::TelemetryConfig;

/// Top-level configuration for the inference routing core.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Configured upstream engines
    #[serde(default)]
    pub engines: EnginesConfig,
    /// Router retry/timeout policy
    #[serde(default)]
    pub router: RouterConfig,
    /// Circuit breaker policy
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Connection pool policy
    #[serde(default)]
    pub pool: PoolConfig,
    /// Active health-probing policy
    #[serde(default)]
    pub health_monitor: HealthMonitorConfig,
    /// Fault domain manager initial state
    #[serde(default)]
    pub fault: FaultConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
