//! Adapter for Ollama's `/api/chat` protocol, which frames streaming
//! responses as newline-delimited JSON rather than SSE.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use switchboard_pool::ConnectionPool;
use url::Url;

use super::{Adapter, AdapterCapabilities, ChunkStream};
use crate::error::AdapterError;
use crate::types::{
    Choice, FinishReason, InferenceRequest, InferenceResponse, ModelInfo, ResponseMessage, StreamChunk, StreamDelta,
    Usage,
};

pub struct OllamaAdapter {
    pool: Arc<ConnectionPool>,
    base_url: Url,
}

impl OllamaAdapter {
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool>, base_url: Url) -> Self {
        Self { pool, base_url }
    }

    fn body(&self, request: &InferenceRequest, stream: bool) -> serde_json::Value {
        let mut options = serde_json::json!({});
        let obj = options.as_object_mut().expect("object literal");
        let p = &request.params;
        if let Some(v) = p.temperature {
            obj.insert("temperature".into(), v.into());
        }
        if let Some(v) = p.top_p {
            obj.insert("top_p".into(), v.into());
        }
        if let Some(v) = p.top_k {
            obj.insert("top_k".into(), v.into());
        }
        if let Some(v) = p.max_tokens {
            obj.insert("num_predict".into(), v.into());
        }

        serde_json::json!({
            "model": request.model_id,
            "messages": request.messages(),
            "stream": stream,
            "options": options,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatLine {
    message: Option<OllamaChatMessage>,
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaTagModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagModel {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    details: Option<OllamaTagDetails>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagDetails {
    #[serde(default)]
    quantization_level: Option<String>,
}

#[async_trait]
impl Adapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { streaming: true }
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, AdapterError> {
        let url = self.base_url.join("api/chat").unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(url)
            .json(&self.body(request, false))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let line: OllamaChatLine = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        Ok(InferenceResponse {
            id: String::new(),
            model: request.model_id.clone(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage::assistant(line.message.map(|m| m.content).unwrap_or_default()),
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage::new(line.prompt_eval_count.unwrap_or(0), line.eval_count.unwrap_or(0)),
            engine: String::new(),
            latency_ms: 0,
        })
    }

    async fn complete_stream(&self, request: &InferenceRequest) -> Result<ChunkStream, AdapterError> {
        let url = self.base_url.join("api/chat").unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(url)
            .json(&self.body(request, true))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        // Ollama's stream is one JSON object per line, not SSE-framed;
        // buffer raw bytes and split on '\n' as lines arrive. The lease
        // moves into the closure so its permit outlives the body read.
        let mut buf = Vec::new();
        let stream = response.bytes_stream().flat_map(move |chunk| {
            let _lease = &lease;
            let mut lines = Vec::new();
            match chunk {
                Ok(bytes) => {
                    buf.extend_from_slice(&bytes);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let line = &line[..line.len().saturating_sub(1)];
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_slice::<OllamaChatLine>(line) {
                            Ok(parsed) => lines.push(Ok(to_chunk(parsed))),
                            Err(e) => {
                                tracing::debug!(error = %e, "skipping unparseable ollama ndjson line");
                            }
                        }
                    }
                }
                Err(e) => lines.push(Err(map_reqwest_err(e))),
            }
            futures_util::stream::iter(lines)
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

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AdapterError> {
        let url = self.base_url.join("api/tags").unwrap_or_else(|_| self.base_url.clone());
        let lease = self.pool.acquire().await?;
        let response = lease.client().get(url).send().await.map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        Ok(parsed
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name,
                owned_by: "ollama".to_string(),
                size: m.size,
                quantization: m.details.and_then(|d| d.quantization_level),
            })
            .collect())
    }
}

fn to_chunk(line: OllamaChatLine) -> StreamChunk {
    let content = line.message.map(|m| m.content).unwrap_or_default();
    if line.done {
        let mut chunk = StreamChunk::terminal(
            0,
            FinishReason::Stop,
            Some(Usage::new(line.prompt_eval_count.unwrap_or(0), line.eval_count.unwrap_or(0))),
        );
        if !content.is_empty() {
            chunk.delta = StreamDelta {
                role: None,
                content: Some(content),
            };
        }
        chunk
    } else {
        StreamChunk::content_delta(0, content)
    }
}

fn map_reqwest_err(e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::Timeout
    } else {
        AdapterError::Transport(e.to_string())
    }
}
