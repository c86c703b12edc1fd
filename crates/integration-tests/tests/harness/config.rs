//! Programmatic configuration builder for integration tests

use switchboard_config::{Config, EngineConfig};
use switchboard_core::EngineType;

/// Builder for constructing test configurations against mock upstreams
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self { config: Config::default() }
    }

    /// Register an upstream engine serving `models` (id, priority tier)
    pub fn with_engine(mut self, engine_type: EngineType, endpoint: url::Url, models: &[(&str, u8)]) -> Self {
        self.config.engines.upstreams.push(EngineConfig {
            engine_type,
            endpoint,
            models: models.iter().map(|(id, priority)| ((*id).to_owned(), *priority)).collect(),
            streaming: true,
            tls_verify: true,
        });
        self
    }

    /// Disable streaming support for the most recently added engine
    pub fn without_streaming(mut self) -> Self {
        if let Some(engine) = self.config.engines.upstreams.last_mut() {
            engine.streaming = false;
        }
        self
    }

    /// Flip the fault domain manager's initial kill switch state
    pub fn with_kill_switch(mut self, enabled: bool) -> Self {
        self.config.fault.kill_switch = enabled;
        self
    }

    /// Cap the number of candidates the router will try per request
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.router.max_attempts = max_attempts;
        self
    }

    /// Quarantine window the breaker imposes once it opens
    pub fn with_breaker_recovery(mut self, recovery: &str) -> Self {
        self.config.breaker.recovery = recovery.to_owned();
        self
    }

    /// Consecutive failures within the window needed to open the breaker
    pub fn with_breaker_error_threshold(mut self, threshold: u32) -> Self {
        self.config.breaker.error_threshold = threshold;
        self
    }

    /// How long a router-observed failure quarantines an upstream from
    /// candidate selection, independent of the breaker's own state
    pub fn with_health_quarantine(mut self, quarantine: &str) -> Self {
        self.config.health_monitor.router_failure_quarantine = quarantine.to_owned();
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
