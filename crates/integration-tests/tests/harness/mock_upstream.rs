//! Mock upstream engine servers standing in for vLLM/TGI/Ollama.
//!
//! Implements just enough of each engine's native wire protocol (see
//! `switchboard-adapters::engines::{openai_chat,tgi,ollama}`) to drive
//! the real adapters against an HTTP server instead of a trait stub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    OpenAi,
    Tgi,
    Ollama,
}

struct MockState {
    request_count: AtomicU32,
    fail_count: AtomicU32,
    response_text: String,
}

/// A running mock upstream. Dropping it cancels the server task.
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start(kind: EngineKind) -> anyhow::Result<Self> {
        Self::start_inner(kind, 0, "hello from mock upstream".to_owned()).await
    }

    /// Fail the first `n` inference requests with a 503, then succeed.
    pub async fn start_failing(kind: EngineKind, n: u32) -> anyhow::Result<Self> {
        Self::start_inner(kind, n, "hello from mock upstream".to_owned()).await
    }

    pub async fn start_with_response(kind: EngineKind, text: &str) -> anyhow::Result<Self> {
        Self::start_inner(kind, 0, text.to_owned()).await
    }

    async fn start_inner(kind: EngineKind, fail_count: u32, response_text: String) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            request_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            response_text,
        });

        let app = match kind {
            EngineKind::OpenAi => Router::new()
                .route("/health", routing::get(health_ok))
                .route("/v1/chat/completions", routing::post(openai_chat_completions))
                .route("/v1/models", routing::get(openai_models))
                .route("/v1/embeddings", routing::post(openai_embeddings)),
            EngineKind::Tgi => Router::new()
                .route("/health", routing::get(health_ok))
                .route("/generate", routing::post(tgi_generate))
                .route("/generate_stream", routing::post(tgi_generate_stream)),
            EngineKind::Ollama => Router::new()
                .route("/", routing::get(health_ok))
                .route("/api/chat", routing::post(ollama_chat))
                .route("/api/tags", routing::get(ollama_tags)),
        }
        .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown_clone.cancelled().await })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL suitable for an `EngineConfig::endpoint`.
    pub fn endpoint(&self) -> url::Url {
        format!("http://{}/", self.addr).parse().expect("valid mock endpoint")
    }

    /// Requests handled so far, including failed ones and health probes.
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn health_ok() -> StatusCode {
    StatusCode::OK
}

fn take_failure(state: &MockState) -> bool {
    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining == 0 {
        return false;
    }
    state.fail_count.fetch_sub(1, Ordering::Relaxed);
    true
}

// -- OpenAI-compatible (vLLM/SGLang/LMDeploy) --

#[derive(Debug, Deserialize)]
struct OpenAiRequest {
    model: String,
    #[serde(default)]
    stream: bool,
}

async fn openai_chat_completions(
    State(state): State<Arc<MockState>>,
    Json(req): Json<OpenAiRequest>,
) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    if take_failure(&state) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "mock upstream unavailable"})),
        )
            .into_response();
    }

    if req.stream {
        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            serde_json::json!({
                "choices": [{"index": 0, "delta": {"role": "assistant", "content": state.response_text}, "finish_reason": null}],
            }),
            serde_json::json!({
                "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 4, "completion_tokens": 3},
            }),
        );
        return (StatusCode::OK, [("content-type", "text/event-stream")], body).into_response();
    }

    Json(serde_json::json!({
        "choices": [{
            "index": 0,
            "message": {"content": state.response_text},
            "finish_reason": "stop",
        }],
        "usage": {"prompt_tokens": 4, "completion_tokens": 3},
    }))
    .into_response()
}

async fn openai_models(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Json(serde_json::json!({
        "data": [{"id": "mock-model", "owned_by": "mock"}],
    }))
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingRequest {
    #[allow(dead_code)]
    model: String,
    input: serde_json::Value,
}

async fn openai_embeddings(
    State(state): State<Arc<MockState>>,
    Json(req): Json<OpenAiEmbeddingRequest>,
) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let count = req.input.as_array().map_or(1, Vec::len);
    let data: Vec<_> = (0..count)
        .map(|i| serde_json::json!({"index": i, "embedding": [0.1, 0.2, 0.3]}))
        .collect();
    Json(serde_json::json!({
        "data": data,
        "usage": {"prompt_tokens": 4, "completion_tokens": 0},
    }))
}

// -- TGI native protocol --

async fn tgi_generate(State(state): State<Arc<MockState>>, Json(_req): Json<serde_json::Value>) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    if take_failure(&state) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "mock upstream unavailable"})),
        )
            .into_response();
    }

    Json(serde_json::json!({ "generated_text": state.response_text })).into_response()
}

async fn tgi_generate_stream(
    State(state): State<Arc<MockState>>,
    Json(_req): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    if take_failure(&state) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/event-stream")],
            String::new(),
        )
            .into_response();
    }

    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        serde_json::json!({"token": {"text": state.response_text, "special": false}, "generated_text": null}),
        serde_json::json!({"token": {"text": "", "special": true}, "generated_text": state.response_text}),
    );
    (StatusCode::OK, [("content-type", "text/event-stream")], body).into_response()
}

// -- Ollama native protocol --

#[derive(Debug, Deserialize)]
struct OllamaRequest {
    #[serde(default)]
    stream: bool,
}

async fn ollama_chat(State(state): State<Arc<MockState>>, Json(req): Json<OllamaRequest>) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    if take_failure(&state) {
        return (StatusCode::SERVICE_UNAVAILABLE, "mock upstream unavailable".to_owned()).into_response();
    }

    if req.stream {
        // `response_text` is split on "||" into an arbitrary number of
        // deltas, the last of which lands in the terminal `done:true`
        // ndjson line, per spec.md S4's streaming scenario.
        let parts: Vec<&str> = state.response_text.split("||").collect();
        let (last, deltas) = parts.split_last().expect("at least one part");

        let mut body = String::new();
        for delta in deltas {
            body.push_str(&serde_json::json!({"message": {"content": delta}, "done": false}).to_string());
            body.push('\n');
        }
        body.push_str(
            &serde_json::json!({
                "message": {"content": last},
                "done": true,
                "prompt_eval_count": 4,
                "eval_count": 3,
            })
            .to_string(),
        );
        body.push('\n');
        return (StatusCode::OK, body).into_response();
    }

    Json(serde_json::json!({
        "message": {"content": state.response_text},
        "done": true,
        "prompt_eval_count": 4,
        "eval_count": 3,
    }))
    .into_response()
}

async fn ollama_tags(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    Json(serde_json::json!({
        "models": [{"name": "mock-model", "size": 123, "details": {"quantization_level": "Q4_0"}}],
    }))
}
