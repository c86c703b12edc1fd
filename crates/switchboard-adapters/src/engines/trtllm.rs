//! Adapter for TensorRT-LLM fronted by NVIDIA Triton Inference Server.
//!
//! `spec.md`'s engine protocol table has no row for TensorRT-LLM; this
//! resolves that open question by following Triton's own
//! `/v2/models/{model}/generate` and `/v2/models/{model}/generate_stream`
//! surface, which is structurally the same request/SSE-response shape
//! as the TGI/DeepSpeed family, just with a `text_output` field name
//! and the model name embedded in the path instead of the body.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::Deserialize;
use switchboard_pool::ConnectionPool;
use url::Url;

use super::{Adapter, AdapterCapabilities, ChunkStream};
use crate::error::AdapterError;
use crate::types::{Choice, FinishReason, InferenceRequest, InferenceResponse, ResponseMessage, StreamChunk, Usage};
use crate::usage::estimate_tokens;

pub struct TrtLlmAdapter {
    pool: Arc<ConnectionPool>,
    base_url: Url,
}

impl TrtLlmAdapter {
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool>, base_url: Url) -> Self {
        Self { pool, base_url }
    }

    fn path(&self, request: &InferenceRequest, streaming: bool) -> Url {
        let suffix = if streaming { "generate_stream" } else { "generate" };
        self.base_url
            .join(&format!("v2/models/{}/{suffix}", request.model_id))
            .unwrap_or_else(|_| self.base_url.clone())
    }

    fn body(&self, request: &InferenceRequest) -> serde_json::Value {
        let mut body = serde_json::json!({ "text_input": request.prompt() });
        let obj = body.as_object_mut().expect("object literal");
        if let Some(v) = request.params.max_tokens {
            obj.insert("max_tokens".into(), v.into());
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct TritonResponse {
    text_output: String,
}

#[async_trait]
impl Adapter for TrtLlmAdapter {
    fn name(&self) -> &str {
        "tensorrt_llm"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { streaming: true }
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, AdapterError> {
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(self.path(request, false))
            .json(&self.body(request))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let parsed: TritonResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let completion_tokens = estimate_tokens(&parsed.text_output);
        let prompt_tokens = estimate_tokens(&request.prompt());

        Ok(InferenceResponse {
            id: String::new(),
            model: request.model_id.clone(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage::assistant(parsed.text_output),
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage::new(prompt_tokens, completion_tokens),
            engine: String::new(),
            latency_ms: 0,
        })
    }

    async fn complete_stream(&self, request: &InferenceRequest) -> Result<ChunkStream, AdapterError> {
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(self.path(request, true))
            .json(&self.body(request))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        // Triton's generate_stream has no native "this is the last event"
        // marker the way TGI/Ollama/DeepSpeed do; completion is signaled by
        // the HTTP body simply ending. Append a synthetic terminal chunk
        // once that happens so callers still see the one-terminal-chunk
        // invariant every other adapter provides natively.
        let body_stream = response.bytes_stream().eventsource().map(move |event| {
            let _lease = &lease;
            let event = event.map_err(|e| AdapterError::Protocol(e.to_string()))?;
            let chunk: TritonResponse =
                serde_json::from_str(&event.data).map_err(|e| AdapterError::Protocol(e.to_string()))?;
            Ok(StreamChunk::content_delta(0, chunk.text_output))
        });
        let stream = body_stream.chain(futures_util::stream::once(async {
            Ok(StreamChunk::terminal(0, FinishReason::Stop, None))
        }));

        Ok(super::guard_terminator(Box::pin(stream)))
    }

    async fn health_check(&self, timeout: Duration) -> Result<(), AdapterError> {
        let url = self.base_url.join("v2/health/ready").unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AdapterError::Upstream {
                status: response.status().as_u16(),
                body: String::new(),
            })
        }
    }
}

fn map_reqwest_err(e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::Timeout
    } else {
        AdapterError::Transport(e.to_string())
    }
}
