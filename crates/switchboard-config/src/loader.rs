use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, deserializes
    /// it, applies the scalar and per-engine environment variable
    /// overrides from `spec.md` §6, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, an override env var holds an
    /// invalid value, or validation fails.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let mut config: Self =
            toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply the environment variable overrides from `spec.md` §6 so a
    /// bare-environment deployment (no TOML file, or a partial one) still
    /// boots with a usable configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an override env var holds an invalid value.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        crate::env::apply_engine_env_fallbacks(&mut self.engines)?;
        crate::env::apply_scalar_env_overrides(
            &mut self.router,
            &mut self.breaker,
            &mut self.pool,
            &mut self.health_monitor,
            &mut self.fault,
        )
    }

    /// Validate that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns an error if no engines are configured, an engine's model
    /// table is empty, or any duration/enum-valued field is malformed.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_has_engines()?;
        self.validate_engine_models()?;
        self.validate_durations()?;
        self.validate_degradation_level()?;
        Ok(())
    }

    /// Ensure at least one upstream engine is configured.
    fn validate_has_engines(&self) -> anyhow::Result<()> {
        if self.engines.upstreams.is_empty() {
            anyhow::bail!(
                "at least one upstream engine must be configured (via the `[[engines.upstreams]]` table or a `*_URL` environment variable)"
            );
        }
        Ok(())
    }

    /// Every configured upstream must serve at least one model id.
    fn validate_engine_models(&self) -> anyhow::Result<()> {
        for engine in &self.engines.upstreams {
            if engine.models.is_empty() {
                anyhow::bail!(
                    "engine '{}' at {} has no models configured",
                    engine.engine_type,
                    engine.endpoint
                );
            }
        }
        Ok(())
    }

    /// Every human-readable duration field must parse.
    fn validate_durations(&self) -> anyhow::Result<()> {
        self.router.call_timeout_duration()?;
        self.breaker.window_duration()?;
        self.breaker.recovery_duration()?;
        self.pool.connect_timeout_duration()?;
        self.pool.request_timeout_duration()?;
        self.pool.stream_read_timeout_duration()?;
        self.health_monitor.probe_interval_duration()?;
        self.health_monitor.probe_timeout_duration()?;
        self.health_monitor.router_failure_quarantine_duration()?;
        Ok(())
    }

    /// `fault.degradation_level` must be one of the four known levels.
    fn validate_degradation_level(&self) -> anyhow::Result<()> {
        match self.fault.degradation_level.as_str() {
            "none" | "partial" | "full" | "emergency" => Ok(()),
            other => {
                anyhow::bail!("fault.degradation_level must be one of none/partial/full/emergency, got '{other}'")
            }
        }
    }
}
