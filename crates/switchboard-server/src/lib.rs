//! Assembles the inference routing core's HTTP surface: builds the
//! registry/breaker/health monitor/fault domain manager/router from a
//! loaded [`switchboard_config::Config`], wires up the axum routes in
//! spec.md §6, and serves them.

mod error;
mod health;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use switchboard_adapters::Adapter;
use switchboard_adapters::engines::{DeepspeedAdapter, OllamaAdapter, OpenAiChatAdapter, TgiAdapter, TrtLlmAdapter};
use switchboard_breaker::{BreakerConfig, CircuitBreaker};
use switchboard_config::Config;
use switchboard_core::EngineType;
use switchboard_fault::{DegradationLevel, FaultDomainManager};
use switchboard_health::{HealthMonitor, HealthMonitorConfig, MonitoredUpstream};
use switchboard_pool::{ConnectionPool, PoolConfig};
use switchboard_registry::{Capability, ModelEntry, ModelRegistry, ModelRegistryBuilder};
use switchboard_router::{Router as InferenceRouter, RouterConfig};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Assembled server: the axum router plus the address it should bind.
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    health_shutdown: tokio_util::sync::CancellationToken,
}

impl Server {
    /// Build every component from `config` and assemble the HTTP router.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured duration string fails to parse
    /// or a per-upstream connection pool fails to build (e.g. an
    /// unsupported TLS configuration).
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (registry, monitored) = build_registry(&config)?;

        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig {
            error_threshold: config.breaker.error_threshold,
            window_seconds: config.breaker.window_duration()?.as_secs(),
            recovery_seconds: config.breaker.recovery_duration()?.as_secs(),
            half_open_max_calls: config.breaker.half_open_max_calls,
            success_threshold: config.breaker.success_threshold,
        }));

        let health = Arc::new(HealthMonitor::new(HealthMonitorConfig {
            probe_interval: config.health_monitor.probe_interval_duration()?,
            probe_timeout: config.health_monitor.probe_timeout_duration()?,
            degraded_after_failures: config.health_monitor.degraded_after_failures,
            down_after_failures: config.health_monitor.down_after_failures,
            recovered_after_successes: config.health_monitor.recovered_after_successes,
            router_failure_quarantine: config.health_monitor.router_failure_quarantine_duration()?,
        }));

        let fault = Arc::new(FaultDomainManager::new());
        fault.set_kill_switch(config.fault.kill_switch);
        fault.set_degradation_level(parse_degradation_level(&config.fault.degradation_level));

        let inference_router = Arc::new(InferenceRouter::new(
            Arc::new(registry),
            Arc::clone(&breaker),
            Arc::clone(&health),
            Arc::clone(&fault),
            RouterConfig {
                max_attempts: config.router.max_attempts,
                call_timeout: config.router.call_timeout_duration()?,
            },
        ));

        // Pre-register every upstream as healthy before the first probe
        // pass has a chance to run, so `/health` reflects "at least one
        // engine configured" immediately at boot rather than racing the
        // background probe loop.
        for upstream in &monitored {
            health.health_for(upstream.engine_type, &upstream.endpoint);
        }

        let health_shutdown = tokio_util::sync::CancellationToken::new();
        Arc::clone(&health).spawn(monitored, health_shutdown.clone());

        let state = AppState {
            router: inference_router,
            fault,
            health,
        };

        let mut app = Router::new();
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }
        app = app.merge(routes::router());
        let app = app.with_state(state).layer(TraceLayer::new_for_http());

        Ok(Self {
            router: app,
            listen_address: config.server.listen_address,
            health_shutdown,
        })
    }

    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router, for tests that
    /// drive it directly rather than binding a socket.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails.
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        let health_shutdown = self.health_shutdown;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                health_shutdown.cancel();
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

fn parse_degradation_level(raw: &str) -> DegradationLevel {
    match raw {
        "partial" => DegradationLevel::Partial,
        "full" => DegradationLevel::Full,
        "emergency" => DegradationLevel::Emergency,
        _ => DegradationLevel::None,
    }
}

/// Engines whose wire protocol natively supports the `/v1/embeddings`
/// surface: the OpenAI-chat family. The others (TGI, Ollama,
/// TensorRT-LLM/Triton, DeepSpeed) fail `Unsupported` for embeddings at
/// the adapter layer, so there is no value registering the capability
/// for them.
const fn supports_embeddings(engine_type: EngineType) -> bool {
    matches!(engine_type, EngineType::Vllm | EngineType::Sglang | EngineType::Lmdeploy)
}

fn build_adapter(engine_type: EngineType, pool: Arc<ConnectionPool>, endpoint: url::Url) -> Arc<dyn Adapter> {
    match engine_type {
        EngineType::Vllm => Arc::new(OpenAiChatAdapter::new("vllm", pool, endpoint)),
        EngineType::Sglang => Arc::new(OpenAiChatAdapter::new("sglang", pool, endpoint)),
        EngineType::Lmdeploy => Arc::new(OpenAiChatAdapter::new("lmdeploy", pool, endpoint)),
        EngineType::Tgi => Arc::new(TgiAdapter::new(pool, endpoint)),
        EngineType::Ollama => Arc::new(OllamaAdapter::new(pool, endpoint)),
        EngineType::TensorrtLlm => Arc::new(TrtLlmAdapter::new(pool, endpoint)),
        EngineType::Deepspeed => Arc::new(DeepspeedAdapter::new(pool, endpoint)),
    }
}

/// Build the model registry and the list of upstreams the health
/// monitor should probe from the configured engines. One connection
/// pool and one adapter instance per configured upstream; every model
/// id it serves becomes a registry entry sharing that same adapter.
fn build_registry(config: &Config) -> anyhow::Result<(ModelRegistry, Vec<MonitoredUpstream>)> {
    let mut builder = ModelRegistryBuilder::new();
    let mut monitored = Vec::new();

    for engine in &config.engines.upstreams {
        let pool = Arc::new(ConnectionPool::new(PoolConfig {
            max_connections: config.pool.max_connections,
            connect_timeout: config.pool.connect_timeout_duration()?,
            request_timeout: config.pool.request_timeout_duration()?,
            stream_read_timeout: config.pool.stream_read_timeout_duration()?,
            tls_verify: engine.tls_verify,
        })?);

        let adapter = build_adapter(engine.engine_type, Arc::clone(&pool), engine.endpoint.clone());

        monitored.push(MonitoredUpstream {
            engine_type: engine.engine_type,
            endpoint: engine.endpoint.to_string(),
            adapter: Arc::clone(&adapter),
        });

        let mut capabilities = vec![Capability::Chat, Capability::Completion];
        if engine.streaming && adapter.capabilities().streaming {
            capabilities.push(Capability::Streaming);
        }
        if supports_embeddings(engine.engine_type) {
            capabilities.push(Capability::Embedding);
        }

        for (model_id, priority) in &engine.models {
            builder.register(ModelEntry {
                model_id: model_id.clone(),
                engine_type: engine.engine_type,
                endpoint: engine.endpoint.to_string(),
                adapter: Arc::clone(&adapter),
                priority: *priority,
                capabilities: capabilities.clone(),
            })?;
        }
    }

    Ok((builder.seal(), monitored))
}
