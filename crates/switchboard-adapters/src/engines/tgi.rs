//! Adapter for Hugging Face Text Generation Inference's native
//! `/generate` and `/generate_stream` protocol (distinct from its
//! optional OpenAI-compatible shim, which this core does not use).

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

pub struct TgiAdapter {
    pool: Arc<ConnectionPool>,
    base_url: Url,
}

impl TgiAdapter {
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool>, base_url: Url) -> Self {
        Self { pool, base_url }
    }

    fn parameters(&self, request: &InferenceRequest) -> serde_json::Value {
        let p = &request.params;
        let mut params = serde_json::json!({});
        let obj = params.as_object_mut().expect("object literal");
        if let Some(v) = p.max_tokens {
            obj.insert("max_new_tokens".into(), v.into());
        }
        if let Some(v) = p.temperature {
            obj.insert("temperature".into(), v.into());
        }
        if let Some(v) = p.top_p {
            obj.insert("top_p".into(), v.into());
        }
        if let Some(v) = p.repetition_penalty() {
            obj.insert("repetition_penalty".into(), v.into());
        }
        if let Some(ref v) = p.stop {
            obj.insert("stop".into(), v.clone().into());
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct TgiResponse {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
struct TgiStreamToken {
    token: TgiToken,
    generated_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgiToken {
    text: String,
    special: bool,
}

#[async_trait]
impl Adapter for TgiAdapter {
    fn name(&self) -> &str {
        "tgi"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { streaming: true }
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, AdapterError> {
        let body = serde_json::json!({
            "inputs": request.prompt(),
            "parameters": self.parameters(request),
        });

        let url = self.base_url.join("generate").unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease.client().post(url).json(&body).send().await.map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let parsed: TgiResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let completion_tokens = estimate_tokens(&parsed.generated_text);
        let prompt_tokens = estimate_tokens(&request.prompt());

        Ok(InferenceResponse {
            id: String::new(),
            model: request.model_id.clone(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage::assistant(parsed.generated_text),
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage::new(prompt_tokens, completion_tokens),
            engine: String::new(),
            latency_ms: 0,
        })
    }

    async fn complete_stream(&self, request: &InferenceRequest) -> Result<ChunkStream, AdapterError> {
        let body = serde_json::json!({
            "inputs": request.prompt(),
            "parameters": self.parameters(request),
        });

        let url = self
            .base_url
            .join("generate_stream")
            .unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease.client().post(url).json(&body).send().await.map_err(map_reqwest_err)?;

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
                match serde_json::from_str::<TgiStreamToken>(&event.data) {
                    Ok(tok) if tok.token.special => tok
                        .generated_text
                        .map(|_| Ok(StreamChunk::terminal(0, FinishReason::Stop, None))),
                    Ok(tok) => Some(Ok(StreamChunk::content_delta(0, tok.token.text))),
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unparseable tgi stream token");
                        None
                    }
                }
            }
        });

        Ok(super::guard_terminator(Box::pin(stream)))
    }

    async fn health_check(&self, timeout: Duration) -> Result<(), AdapterError> {
        let url = self
            .base_url
            .join("health")
            .unwrap_or_else(|_| self.base_url.clone());
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
