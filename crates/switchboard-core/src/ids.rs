use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of inference engine an upstream speaks.
///
/// Shared by the registry, health monitor, and adapters so that every
/// component keys state the same way: `(EngineType, endpoint)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    Vllm,
    Tgi,
    Sglang,
    Ollama,
    TensorrtLlm,
    Lmdeploy,
    Deepspeed,
}

impl EngineType {
    /// Short identifier used in config keys, metrics labels, and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vllm => "vllm",
            Self::Tgi => "tgi",
            Self::Sglang => "sglang",
            Self::Ollama => "ollama",
            Self::TensorrtLlm => "tensorrt_llm",
            Self::Lmdeploy => "lmdeploy",
            Self::Deepspeed => "deepspeed",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_as_str() {
        for engine in [
            EngineType::Vllm,
            EngineType::Tgi,
            EngineType::Sglang,
            EngineType::Ollama,
            EngineType::TensorrtLlm,
            EngineType::Lmdeploy,
            EngineType::Deepspeed,
        ] {
            assert_eq!(engine.to_string(), engine.as_str());
        }
    }
}
