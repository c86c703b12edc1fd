//! HTTP handlers for the core-facing API surface (spec.md §6): chat
//! completions, completions, embeddings, and model listing. Request
//! bodies are OpenAI-compatible; [`switchboard_adapters::SamplingParams`]
//! already derives the field names that protocol uses, so wire request
//! structs here just flatten it in rather than duplicating every knob.

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use switchboard_adapters::{EmbeddingRequest, EmbeddingResponse, InferenceRequest, Message, ModelInfo, SamplingParams};
use switchboard_core::HttpError;
use switchboard_registry::Capability;
use switchboard_router::RouterChunkStream;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/models", get(list_models))
}

#[derive(Debug, Deserialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(default)]
    stream: bool,
    #[serde(flatten)]
    params: SamplingParams,
}

impl ChatCompletionRequest {
    fn into_inference_request(self) -> InferenceRequest {
        InferenceRequest {
            model_id: self.model,
            messages: Some(self.messages),
            prompt: None,
            params: self.params,
            stream: self.stream,
            extra: std::collections::HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    #[serde(default)]
    stream: bool,
    #[serde(flatten)]
    params: SamplingParams,
}

impl CompletionRequest {
    fn into_inference_request(self) -> InferenceRequest {
        InferenceRequest {
            model_id: self.model,
            messages: None,
            prompt: Some(self.prompt),
            params: self.params,
            stream: self.stream,
            extra: std::collections::HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingInput {
    One(String),
    Many(Vec<String>),
}

impl EmbeddingInput {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(text) => vec![text],
            Self::Many(texts) => texts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsRequest {
    model: String,
    input: EmbeddingInput,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

/// `POST /v1/chat/completions`. `stream:true` selects the SSE branch;
/// otherwise the router's `InferenceResponse` already matches the wire
/// shape spec.md §6 wants, so the handler just forwards it.
async fn chat_completions(State(state): State<AppState>, Json(wire): Json<ChatCompletionRequest>) -> Response {
    let stream = wire.stream;
    let request = wire.into_inference_request();

    if stream {
        match state.router.route_stream(&request).await {
            Ok(chunks) => sse_response(chunks).into_response(),
            Err(e) => ApiError::from(e).into_response(),
        }
    } else {
        match state.router.route(&request, Capability::Chat).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => ApiError::from(e).into_response(),
        }
    }
}

/// `POST /v1/completions`. Same shape as chat completions, resolved
/// against the registry's `Capability::Completion` entries instead.
async fn completions(State(state): State<AppState>, Json(wire): Json<CompletionRequest>) -> Response {
    let stream = wire.stream;
    let request = wire.into_inference_request();

    if stream {
        match state.router.route_stream(&request).await {
            Ok(chunks) => sse_response(chunks).into_response(),
            Err(e) => ApiError::from(e).into_response(),
        }
    } else {
        match state.router.route(&request, Capability::Completion).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => ApiError::from(e).into_response(),
        }
    }
}

/// `POST /v1/embeddings`. `input` accepts either a single string or a
/// batch, per spec.md §6.
async fn embeddings(
    State(state): State<AppState>,
    Json(wire): Json<EmbeddingsRequest>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let request = EmbeddingRequest {
        model_id: wire.model,
        input: wire.input.into_vec(),
    };
    let response = state.router.embed(&request).await?;
    Ok(Json(response))
}

/// `GET /v1/models`. Merges live adapter discovery with the
/// statically configured registry, per [`switchboard_router::Router::list_models`].
async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        data: state.router.list_models().await,
    })
}

/// Render a router chunk stream as SSE: one `data: {chunk}` event per
/// item, with a trailing `data: [DONE]` once the stream's terminal
/// chunk has been sent, per spec.md §6's SSE framing.
fn sse_response(stream: RouterChunkStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let body = stream.flat_map(|item| {
        let events: Vec<Result<Event, Infallible>> = match item {
            Ok(chunk) => {
                let terminal = chunk.is_terminal();
                let data = serde_json::to_string(&chunk).unwrap_or_default();
                let mut events = vec![Ok(Event::default().data(data))];
                if terminal {
                    events.push(Ok(Event::default().data("[DONE]")));
                }
                events
            }
            Err(e) => {
                let data = serde_json::json!({
                    "error": { "message": e.client_message(), "type": e.error_type() }
                });
                vec![Ok(Event::default().data(data.to_string()))]
            }
        };
        futures_util::stream::iter(events)
    });

    Sse::new(body).keep_alive(KeepAlive::default())
}
