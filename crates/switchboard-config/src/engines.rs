use std::collections::HashMap;

use serde::Deserialize;
use switchboard_core::EngineType;
use url::Url;

/// One configured upstream engine instance.
///
/// Per-engine-type URL environment variables (`VLLM_URL`, `TGI_URL`, ...)
/// are read as a fallback when the TOML file doesn't configure an
/// engine of that type at all — see [`crate::env::apply_engine_env_fallbacks`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub engine_type: EngineType,
    pub endpoint: Url,
    /// Model ids this upstream serves, mapped to their priority tier
    /// (higher is preferred) within the registry.
    pub models: HashMap<String, u8>,
    #[serde(default = "default_true")]
    pub streaming: bool,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

const fn default_true() -> bool {
    true
}

/// Top-level engines table: one list entry per configured upstream.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnginesConfig {
    #[serde(default)]
    pub upstreams: Vec<EngineConfig>,
}
