//! The router: resolves a model id to a candidate set, gates it
//! through the fault domain manager, picks a candidate with
//! priority-tiered round-robin, and drives the call through the
//! circuit breaker.
//!
//! Generalizes the failover pattern of trying ordered candidate
//! groups into a registry-driven model: candidates come from
//! [`ModelRegistry::resolve`], tiers come from `ModelEntry::priority`,
//! and round-robin fairness is tracked per `(model_id, priority)` with
//! an atomic counter rather than fixed first-match ordering.

pub mod error;

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use switchboard_adapters::{
    EmbeddingRequest, EmbeddingResponse, InferenceRequest, InferenceResponse, ModelInfo, StreamChunk,
};
use switchboard_breaker::{Admission, CircuitBreaker};
use switchboard_fault::{Feature, FaultDomainManager};
use switchboard_health::HealthMonitor;
use switchboard_registry::{Capability, ModelEntry, ModelRegistry};

pub use error::RouterError;

/// A stream of chunks as handed back to callers: unlike
/// [`switchboard_adapters::ChunkStream`], a mid-stream failure is
/// reported as [`RouterError::StreamInterrupted`] rather than the raw
/// adapter error, per spec.md §4.7's resolved open question — once a
/// chunk has reached the caller the stream can't be transparently
/// retried against another candidate, so every failure past the first
/// chunk collapses to one error kind.
pub type RouterChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, RouterError>> + Send>>;

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub max_attempts: u32,
    pub call_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: Duration::from_secs(30),
        }
    }
}

fn breaker_key(entry: &ModelEntry) -> String {
    format!("{}:{}", entry.engine_type, entry.endpoint)
}

/// Ties the registry, breaker, health monitor, and fault domain
/// manager together behind `route`/`route_stream`.
pub struct Router {
    registry: Arc<ModelRegistry>,
    breaker: Arc<CircuitBreaker>,
    health: Arc<HealthMonitor>,
    fault: Arc<FaultDomainManager>,
    round_robin: DashMap<(String, u8), AtomicU64>,
    config: RouterConfig,
}

impl Router {
    #[must_use]
    pub fn new(
        registry: Arc<ModelRegistry>,
        breaker: Arc<CircuitBreaker>,
        health: Arc<HealthMonitor>,
        fault: Arc<FaultDomainManager>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            breaker,
            health,
            fault,
            round_robin: DashMap::new(),
            config,
        }
    }

    /// Every registered entry for `model_id`/`capability` (spec.md
    /// §4.7 step 3's raw `Registry.Resolve`), grouped into priority
    /// tiers (highest number first, per spec.md §3: "priority (int;
    /// higher = preferred)") and rotated round-robin within each tier
    /// so repeated calls spread load evenly across same-priority
    /// upstreams. Not yet filtered by fault gates or health.
    fn resolve_ordered(&self, model_id: &str, capability: Capability) -> Vec<&ModelEntry> {
        let mut entries: Vec<&ModelEntry> = self.registry.resolve(model_id, capability);

        entries.sort_by_key(|e| std::cmp::Reverse(e.priority));

        let mut tiers: Vec<Vec<&ModelEntry>> = Vec::new();
        for entry in entries.drain(..) {
            match tiers.last_mut() {
                Some(tier) if tier[0].priority == entry.priority => tier.push(entry),
                _ => tiers.push(vec![entry]),
            }
        }

        let mut ordered = Vec::new();
        for tier in tiers {
            ordered.extend(self.rotate(model_id, &tier));
        }
        ordered
    }

    /// Candidates for `model_id`/`capability`: the raw, priority-
    /// ordered entry set from [`Self::resolve_ordered`], plus the
    /// subset of it the fault domain manager and health monitor
    /// currently allow. Callers use the filtered subset when it's
    /// non-empty, falling back to the raw set's first entry otherwise
    /// (spec.md §4.7 step 5's last-resort attempt) — the raw set is
    /// computed once and reused for both so a single call doesn't
    /// advance the round-robin counter twice.
    fn candidates(&self, model_id: &str, capability: Capability, feature: Feature) -> (Vec<&ModelEntry>, Vec<&ModelEntry>) {
        let raw = self.resolve_ordered(model_id, capability);
        let filtered = raw
            .iter()
            .copied()
            .filter(|e| self.fault.gate(e.engine_type, &e.endpoint, feature).is_ok())
            .filter(|e| self.health.health_for(e.engine_type, &e.endpoint).is_available())
            .collect();
        (raw, filtered)
    }

    /// Apply spec.md §4.7 step 5: if fault/health filtering left no
    /// candidates, fall back to the first raw entry as a last resort
    /// rather than failing outright. Returns `None` only when the
    /// registry had no entry at all for this model/capability.
    fn candidates_or_fallback<'a>(&self, raw: Vec<&'a ModelEntry>, filtered: Vec<&'a ModelEntry>) -> Option<Vec<&'a ModelEntry>> {
        if !filtered.is_empty() {
            return Some(filtered);
        }
        if let Some(&first) = raw.first() {
            tracing::warn!(
                endpoint = %first.endpoint,
                "no fault/health-eligible candidate; attempting last-resort entry"
            );
            return Some(vec![first]);
        }
        None
    }

    fn rotate<'a>(&self, model_id: &str, tier: &[&'a ModelEntry]) -> Vec<&'a ModelEntry> {
        if tier.is_empty() {
            return Vec::new();
        }
        let priority = tier[0].priority;
        let counter = self
            .round_robin
            .entry((model_id.to_owned(), priority))
            .or_insert_with(|| AtomicU64::new(0));
        let start = counter.fetch_add(1, Ordering::Relaxed) as usize % tier.len();

        let mut rotated = Vec::with_capacity(tier.len());
        rotated.extend_from_slice(&tier[start..]);
        rotated.extend_from_slice(&tier[..start]);
        rotated
    }

    /// Checks that apply before the registry is ever consulted: the
    /// kill switch short-circuits every request, and a feature disabled
    /// at the current degradation level is reported as `FeatureDegraded`
    /// rather than surfacing as "no candidates" once filtering removes
    /// every entry downstream.
    fn check_global_gates(&self, feature: Feature) -> Result<(), RouterError> {
        if self.fault.kill_switch_enabled() {
            return Err(RouterError::KillSwitchEnabled);
        }
        if self.fault.degradation_level().disables(feature) {
            return Err(RouterError::FeatureDegraded);
        }
        Ok(())
    }

    async fn call_one(&self, entry: &ModelEntry, request: &InferenceRequest) -> Result<InferenceResponse, RouterError> {
        let key = breaker_key(entry);
        let admission = self.breaker.try_admit(&key);
        let Admission::Admit(state) = admission else {
            return Err(RouterError::BreakerOpen);
        };

        let started = Instant::now();
        let result = tokio::time::timeout(self.config.call_timeout, entry.adapter.complete(request)).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome = match result {
            Ok(Ok(mut response)) => {
                response.stamp(uuid::Uuid::new_v4().to_string(), entry.adapter.name().to_owned(), latency_ms);
                Ok(response)
            }
            Ok(Err(e)) => Err(RouterError::from_adapter(e)),
            Err(_) => Err(RouterError::Timeout),
        };

        self.breaker.record_result(&key, state, outcome.is_ok());
        if outcome.is_err() {
            self.health.record_router_failure(entry.engine_type, &entry.endpoint);
        }
        outcome
    }

    /// Resolve `request.model_id`, try candidates in priority/round-
    /// robin order, retrying on any [`RouterError::is_retryable`] error
    /// up to `max_attempts` times.
    ///
    /// `capability` distinguishes the chat-completions endpoint from the
    /// plain-completions one; both go through the same retry/failover
    /// machinery, just resolved against a different entry set.
    pub async fn route(&self, request: &InferenceRequest, capability: Capability) -> Result<InferenceResponse, RouterError> {
        self.check_global_gates(Feature::NonPriorityTraffic)?;

        let (raw, filtered) = self.candidates(&request.model_id, capability, Feature::NonPriorityTraffic);
        let Some(candidates) = self.candidates_or_fallback(raw, filtered) else {
            return Err(RouterError::NoEngineAvailable {
                model_id: request.model_id.clone(),
            });
        };

        let mut last_err = None;
        let attempts = self.config.max_attempts.min(
            u32::try_from(candidates.len()).unwrap_or(u32::MAX),
        );

        for entry in candidates.into_iter().take(attempts as usize) {
            match self.call_one(entry, request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(endpoint = %entry.endpoint, error = %e, "candidate failed, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let source = last_err.unwrap_or_else(|| RouterError::NoEngineAvailable {
            model_id: request.model_id.clone(),
        });
        Err(RouterError::AllEnginesFailed {
            attempts,
            source: Box::new(source),
        })
    }

    /// Streaming counterpart. Per the resolved open question on
    /// streaming retries: once the first chunk has reached the caller
    /// a stream cannot be un-sent, so failover is attempted only
    /// before that point — at most one candidate is tried here, not
    /// `max_attempts`.
    pub async fn route_stream(&self, request: &InferenceRequest) -> Result<RouterChunkStream, RouterError> {
        self.check_global_gates(Feature::Streaming)?;

        let (raw, filtered) = self.candidates(&request.model_id, Capability::Streaming, Feature::Streaming);
        let candidates = self.candidates_or_fallback(raw, filtered).ok_or_else(|| RouterError::NoEngineAvailable {
            model_id: request.model_id.clone(),
        })?;
        let entry = candidates[0];

        let key = breaker_key(entry);
        let admission = self.breaker.try_admit(&key);
        let Admission::Admit(state) = admission else {
            return Err(RouterError::BreakerOpen);
        };

        let result = tokio::time::timeout(self.config.call_timeout, entry.adapter.complete_stream(request)).await;

        match result {
            Ok(Ok(stream)) => {
                self.breaker.record_result(&key, state, true);
                let id = uuid::Uuid::new_v4().to_string();
                let model = entry.adapter.name().to_owned();
                let endpoint = entry.endpoint.clone();
                let stamped = stream.map(move |item| match item {
                    Ok(mut chunk) => {
                        chunk.stamp(&id, &model);
                        Ok(chunk)
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %endpoint, error = %e, "stream interrupted after first chunk");
                        Err(RouterError::StreamInterrupted)
                    }
                });
                Ok(Box::pin(stamped))
            }
            Ok(Err(e)) => {
                self.breaker.record_result(&key, state, false);
                self.health.record_router_failure(entry.engine_type, &entry.endpoint);
                Err(RouterError::from_adapter(e))
            }
            Err(_) => {
                self.breaker.record_result(&key, state, false);
                self.health.record_router_failure(entry.engine_type, &entry.endpoint);
                Err(RouterError::Timeout)
            }
        }
    }

    /// Embed a batch of texts against `request.model_id`, with the same
    /// candidate selection and breaker accounting as [`Self::route`] but
    /// no retry: adapters that don't implement embeddings fail
    /// `Unsupported` for every entry, so retrying a different candidate
    /// for the same model would just repeat the same failure.
    pub async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, RouterError> {
        self.check_global_gates(Feature::NonPriorityTraffic)?;

        let (raw, filtered) = self.candidates(&request.model_id, Capability::Embedding, Feature::NonPriorityTraffic);
        let candidates = self.candidates_or_fallback(raw, filtered).ok_or_else(|| RouterError::NoEngineAvailable {
            model_id: request.model_id.clone(),
        })?;
        let entry = candidates[0];

        let key = breaker_key(entry);
        let admission = self.breaker.try_admit(&key);
        let Admission::Admit(state) = admission else {
            return Err(RouterError::BreakerOpen);
        };

        let result = tokio::time::timeout(self.config.call_timeout, entry.adapter.embeddings(request)).await;
        let outcome = match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(RouterError::from_adapter(e)),
            Err(_) => Err(RouterError::Timeout),
        };

        self.breaker.record_result(&key, state, outcome.is_ok());
        if outcome.is_err() {
            self.health.record_router_failure(entry.engine_type, &entry.endpoint);
        }
        outcome
    }

    /// Models available for inference, merging each distinct adapter's
    /// live `ListModels()` result with the registry's configured set.
    /// Adapters that don't support discovery (`Unsupported`) simply
    /// contribute nothing beyond their registry entries.
    pub async fn list_models(&self) -> Vec<ModelInfo> {
        const CAPABILITIES: [Capability; 4] = [
            Capability::Chat,
            Capability::Completion,
            Capability::Embedding,
            Capability::Streaming,
        ];

        let mut seen = HashSet::new();
        let mut probed = HashSet::new();
        let mut merged = Vec::new();

        for model_id in self.registry.model_ids() {
            for capability in CAPABILITIES {
                for entry in self.registry.resolve(model_id, capability) {
                    let probe_key = (entry.engine_type, entry.endpoint.clone());
                    if !probed.insert(probe_key) {
                        continue;
                    }
                    if let Ok(models) = entry.adapter.list_models().await {
                        for model in models {
                            if seen.insert(model.id.clone()) {
                                merged.push(model);
                            }
                        }
                    }
                }
            }
        }

        for model_id in self.registry.model_ids() {
            if seen.insert(model_id.to_owned()) {
                merged.push(ModelInfo {
                    id: model_id.to_owned(),
                    owned_by: "switchboard".to_owned(),
                    size: None,
                    quantization: None,
                });
            }
        }

        merged
    }
}
