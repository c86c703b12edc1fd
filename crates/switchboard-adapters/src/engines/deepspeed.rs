//! Adapter for DeepSpeed-MII's `/generate`/`/generate_stream` protocol.

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

pub struct DeepspeedAdapter {
    pool: Arc<ConnectionPool>,
    base_url: Url,
}

impl DeepspeedAdapter {
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool>, base_url: Url) -> Self {
        Self { pool, base_url }
    }

    fn body(&self, request: &InferenceRequest) -> serde_json::Value {
        let mut body = serde_json::json!({ "text": request.prompt() });
        let obj = body.as_object_mut().expect("object literal");
        if let Some(v) = request.params.max_tokens {
            obj.insert("max_new_tokens".into(), v.into());
        }
        body
    }
}

/// Non-streaming `/generate` response shape: `{"responses": [text]}`.
#[derive(Debug, Deserialize)]
struct DeepspeedResponse {
    responses: Vec<String>,
}

/// Per-record `/generate_stream` shape: `{"text": ..., "finished": ...}`.
#[derive(Debug, Deserialize)]
struct DeepspeedChunk {
    text: String,
    #[serde(default)]
    finished: bool,
}

#[async_trait]
impl Adapter for DeepspeedAdapter {
    fn name(&self) -> &str {
        "deepspeed"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { streaming: true }
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, AdapterError> {
        let url = self.base_url.join("generate").unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(url)
            .json(&self.body(request))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let parsed: DeepspeedResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let text = parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::Protocol("deepspeed response had no responses entries".to_owned()))?;

        let completion_tokens = estimate_tokens(&text);
        let prompt_tokens = estimate_tokens(&request.prompt());

        Ok(InferenceResponse {
            id: String::new(),
            model: request.model_id.clone(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage::assistant(text),
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage::new(prompt_tokens, completion_tokens),
            engine: String::new(),
            latency_ms: 0,
        })
    }

    async fn complete_stream(&self, request: &InferenceRequest) -> Result<ChunkStream, AdapterError> {
        let url = self
            .base_url
            .join("generate_stream")
            .unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(url)
            .json(&self.body(request))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let stream = response.bytes_stream().eventsource().filter_map(move |event| {
            let _lease = &lease;
            async move {
                let event = match event {
                    Ok(e) => e,
                    Err(e) => return Some(Err(AdapterError::Protocol(e.to_string()))),
                };
                match serde_json::from_str::<DeepspeedChunk>(&event.data) {
                    Ok(chunk) if chunk.finished => Some(Ok(StreamChunk::terminal(0, FinishReason::Stop, None))),
                    Ok(chunk) => Some(Ok(StreamChunk::content_delta(0, chunk.text))),
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unparseable deepspeed stream chunk");
                        None
                    }
                }
            }
        });

        Ok(super::guard_terminator(Box::pin(stream)))
    }

    async fn health_check(&self, timeout: Duration) -> Result<(), AdapterError> {
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .get(self.base_url.clone())
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
