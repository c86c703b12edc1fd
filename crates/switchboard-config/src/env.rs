use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use switchboard_core::EngineType;
use url::Url;

use crate::engines::{EngineConfig, EnginesConfig};
use crate::{BreakerConfig, FaultConfig, HealthMonitorConfig, PoolConfig, RouterConfig};

/// Per-engine-type upstream URL environment variable names, in the
/// order `spec.md` §6 lists them.
const ENGINE_URL_VARS: [(&str, EngineType); 7] = [
    ("VLLM_URL", EngineType::Vllm),
    ("TGI_URL", EngineType::Tgi),
    ("SGLANG_URL", EngineType::Sglang),
    ("OLLAMA_URL", EngineType::Ollama),
    ("TRTLLM_URL", EngineType::TensorrtLlm),
    ("LMDEPLOY_URL", EngineType::Lmdeploy),
    ("DEEPSPEED_URL", EngineType::Deepspeed),
];

/// For every engine type with no upstream already configured in the
/// TOML file, fall back to its `*_URL` environment variable (if set),
/// registering it with a single synthetic `default` model id so a
/// bare-environment deployment with no config file still boots and
/// can route.
///
/// # Errors
///
/// Returns an error if an env var is set but is not a valid URL.
pub fn apply_engine_env_fallbacks(engines: &mut EnginesConfig) -> anyhow::Result<()> {
    for (var, engine_type) in ENGINE_URL_VARS {
        if engines.upstreams.iter().any(|e| e.engine_type == engine_type) {
            continue;
        }
        let Ok(raw) = std::env::var(var) else {
            continue;
        };
        let endpoint = Url::parse(&raw).map_err(|e| anyhow::anyhow!("invalid URL in {var}: {e}"))?;
        let mut models = HashMap::new();
        models.insert("default".to_string(), 0);
        engines.upstreams.push(EngineConfig {
            engine_type,
            endpoint,
            models,
            streaming: true,
            tls_verify: true,
        });
    }
    Ok(())
}

fn env_u32(var: &str, into: &mut u32) -> anyhow::Result<()> {
    if let Ok(raw) = std::env::var(var) {
        *into = raw.parse().map_err(|e| anyhow::anyhow!("invalid integer in {var}: {e}"))?;
    }
    Ok(())
}

fn env_usize(var: &str, into: &mut usize) -> anyhow::Result<()> {
    if let Ok(raw) = std::env::var(var) {
        *into = raw.parse().map_err(|e| anyhow::anyhow!("invalid integer in {var}: {e}"))?;
    }
    Ok(())
}

fn env_millis(var: &str, into: &mut String) -> anyhow::Result<()> {
    if let Ok(raw) = std::env::var(var) {
        let millis: u64 = raw.parse().map_err(|e| anyhow::anyhow!("invalid integer in {var}: {e}"))?;
        *into = format!("{millis}ms");
    }
    Ok(())
}

fn env_bool(var: &str, into: &mut bool) -> anyhow::Result<()> {
    if let Ok(raw) = std::env::var(var) {
        *into = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid boolean in {var}: {e}"))?;
    }
    Ok(())
}

fn env_string(var: &str, into: &mut String) {
    if let Ok(raw) = std::env::var(var) {
        *into = raw;
    }
}

/// Apply the `ROUTER_*`, `BREAKER_*`, `HEALTH_*`, `POOL_*`, `KILL_SWITCH`,
/// and `DEGRADATION_LEVEL` overrides from `spec.md` §6 on top of whatever
/// the TOML file (or its defaults) already set.
///
/// # Errors
///
/// Returns an error if any recognized env var holds a value of the
/// wrong type for the field it overrides.
pub fn apply_scalar_env_overrides(
    router: &mut RouterConfig,
    breaker: &mut BreakerConfig,
    pool: &mut PoolConfig,
    health: &mut HealthMonitorConfig,
    fault: &mut FaultConfig,
) -> anyhow::Result<()> {
    env_u32("ROUTER_MAX_RETRIES", &mut router.max_attempts)?;
    env_millis("ROUTER_TIMEOUT_MS", &mut router.call_timeout)?;
    env_u32("BREAKER_THRESHOLD", &mut breaker.error_threshold)?;
    env_millis("BREAKER_RECOVERY_MS", &mut breaker.recovery)?;
    env_millis("HEALTH_INTERVAL_MS", &mut health.probe_interval)?;
    env_usize("POOL_MAX_CONN", &mut pool.max_connections)?;
    env_bool("KILL_SWITCH", &mut fault.kill_switch)?;
    env_string("DEGRADATION_LEVEL", &mut fault.degradation_level);
    Ok(())
}

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// Supports an optional default value via `{{ env.VAR | default("fallback") }}`.
/// When a default is provided and the variable is unset, the default is used
/// instead of returning an error.
///
/// This replaces `DynamicString<T>` by operating on the raw config text
/// before deserialization, so config structs use plain String/SecretString.
/// Lines starting with `#` (TOML comments) are passed through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        // Matches `{{ env.VAR }}` and `{{ env.VAR | default("fallback") }}`
        // Group 1: the key (e.g. `env.VAR_NAME`)
        // Group 2: optional default value inside default("...")
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        // Skip expansion for comment lines
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut result = String::with_capacity(line.len());
        let mut last_end = 0;

        for captures in re().captures_iter(line) {
            let overall = captures.get(0).unwrap();
            let key = captures.get(1).unwrap().as_str();
            let default_value = captures.get(2).map(|m| m.as_str());

            result.push_str(&line[last_end..overall.start()]);

            let mut parts = key.split('.');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("env"), Some(var_name), None) => match std::env::var(var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => match default_value {
                        Some(default) => result.push_str(default),
                        None => {
                            return Err(format!("environment variable not found: `{var_name}`"));
                        }
                    },
                },
                _ => {
                    return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
                }
            }

            last_end = overall.end();
        }

        result.push_str(&line[last_end..]);
        output.push_str(&result);
    }

    // Preserve trailing newline if present
    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}
