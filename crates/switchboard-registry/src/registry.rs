//! The model registry: an append-only-at-boot, read-only-after-seal
//! table mapping model ids to the upstream entries that can serve
//! them.
//!
//! Grounded on the teacher's `ModelRegistry` (profile storage,
//! `find`/sorted-views idioms) merged with its `ModelRouter`'s
//! alias/explicit-provider resolution, reshaped around `spec.md`'s
//! exact `ModelEntry` shape: a priority tier and a capability set
//! rather than cost/quality scoring (no routing-strategy layer is
//! carried over — the router's priority/round-robin scheme replaces
//! it entirely).

use std::sync::Arc;

use indexmap::IndexMap;
use switchboard_adapters::Adapter;
use switchboard_core::EngineType;

use crate::error::RegistryError;

/// A capability an upstream's model can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Chat,
    Completion,
    Embedding,
    Streaming,
}

/// One upstream registration for a given model id.
#[derive(Clone)]
pub struct ModelEntry {
    pub model_id: String,
    pub engine_type: EngineType,
    pub endpoint: String,
    pub adapter: Arc<dyn Adapter>,
    pub priority: u8,
    pub capabilities: Vec<Capability>,
}

impl ModelEntry {
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Builder used during boot; call [`Self::seal`] once configuration
/// has finished loading to get a read-only [`ModelRegistry`].
#[derive(Default)]
pub struct ModelRegistryBuilder {
    entries: IndexMap<String, Vec<ModelEntry>>,
}

impl ModelRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: ModelEntry) -> Result<(), RegistryError> {
        let existing = self.entries.entry(entry.model_id.clone()).or_default();
        if existing
            .iter()
            .any(|e| e.engine_type == entry.engine_type && e.endpoint == entry.endpoint)
        {
            return Err(RegistryError::DuplicateEntry {
                engine_type: entry.engine_type.to_string(),
                endpoint: entry.endpoint,
            });
        }
        existing.push(entry);
        Ok(())
    }

    #[must_use]
    pub fn seal(self) -> ModelRegistry {
        ModelRegistry { entries: self.entries }
    }
}

/// Read-only snapshot of every registered model entry, indexed by
/// model id in insertion order (so iteration and tie-breaking are
/// deterministic across restarts with the same config).
pub struct ModelRegistry {
    entries: IndexMap<String, Vec<ModelEntry>>,
}

impl ModelRegistry {
    /// All entries registered for `model_id` that advertise
    /// `capability`. The registry itself does not consider health or
    /// priority — that's the router's job once it has this candidate
    /// set.
    #[must_use]
    pub fn resolve(&self, model_id: &str, capability: Capability) -> Vec<&ModelEntry> {
        self.entries
            .get(model_id)
            .map(|entries| entries.iter().filter(|e| e.supports(capability)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn model_ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn is_known(&self, model_id: &str) -> bool {
        self.entries.contains_key(model_id)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use switchboard_adapters::{AdapterCapabilities, AdapterError, ChunkStream, InferenceRequest, InferenceResponse};

    use super::*;

    struct StubAdapter;

    #[async_trait]
    impl Adapter for StubAdapter {
        fn name(&self) -> &str {
            "stub"
        }

        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities { streaming: true }
        }

        async fn complete(&self, _request: &InferenceRequest) -> Result<InferenceResponse, AdapterError> {
            unimplemented!()
        }

        async fn complete_stream(&self, _request: &InferenceRequest) -> Result<ChunkStream, AdapterError> {
            unimplemented!()
        }

        async fn health_check(&self, _timeout: std::time::Duration) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn entry(engine_type: EngineType, endpoint: &str, priority: u8) -> ModelEntry {
        ModelEntry {
            model_id: "llama-3-70b".to_owned(),
            engine_type,
            endpoint: endpoint.to_owned(),
            adapter: Arc::new(StubAdapter),
            priority,
            capabilities: vec![Capability::Chat, Capability::Streaming],
        }
    }

    #[test]
    fn resolve_returns_only_matching_capability() {
        let mut builder = ModelRegistryBuilder::new();
        builder.register(entry(EngineType::Vllm, "http://a", 0)).unwrap();
        let registry = builder.seal();

        assert_eq!(registry.resolve("llama-3-70b", Capability::Chat).len(), 1);
        assert_eq!(registry.resolve("llama-3-70b", Capability::Embedding).len(), 0);
        assert_eq!(registry.resolve("unknown", Capability::Chat).len(), 0);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut builder = ModelRegistryBuilder::new();
        builder.register(entry(EngineType::Vllm, "http://a", 0)).unwrap();
        let result = builder.register(entry(EngineType::Vllm, "http://a", 1));
        assert!(result.is_err());
    }
}
