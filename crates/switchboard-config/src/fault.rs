use serde::Deserialize;

/// Initial state of the fault domain manager at boot. Both fields can
/// also be flipped at runtime once the server is up; these are only
/// the values it starts with.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultConfig {
    #[serde(default)]
    pub kill_switch: bool,
    #[serde(default = "default_degradation_level")]
    pub degradation_level: String,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            kill_switch: false,
            degradation_level: default_degradation_level(),
        }
    }
}

fn default_degradation_level() -> String {
    "none".to_string()
}
