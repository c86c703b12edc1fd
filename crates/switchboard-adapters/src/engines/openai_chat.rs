//! Adapter for engines that speak the OpenAI chat-completions wire
//! protocol: vLLM, SGLang, and LMDeploy all expose this surface, so one
//! implementation serves all three, distinguished only by `name`.

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
use crate::types::{
    Choice, Embedding, EmbeddingRequest, EmbeddingResponse, FinishReason, InferenceRequest, InferenceResponse,
    ModelInfo, ResponseMessage, StreamChunk, Usage,
};

pub struct OpenAiChatAdapter {
    name: String,
    pool: Arc<ConnectionPool>,
    base_url: Url,
}

impl OpenAiChatAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>, pool: Arc<ConnectionPool>, base_url: Url) -> Self {
        Self {
            name: name.into(),
            pool,
            base_url,
        }
    }

    fn completions_url(&self) -> Url {
        self.base_url
            .join("v1/chat/completions")
            .unwrap_or_else(|_| self.base_url.clone())
    }

    fn models_url(&self) -> Url {
        self.base_url.join("v1/models").unwrap_or_else(|_| self.base_url.clone())
    }

    fn embeddings_url(&self) -> Url {
        self.base_url
            .join("v1/embeddings")
            .unwrap_or_else(|_| self.base_url.clone())
    }

    fn body(&self, request: &InferenceRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model_id,
            "messages": request.messages(),
            "stream": stream,
        });
        let obj = body.as_object_mut().expect("object literal");
        let p = &request.params;
        if let Some(t) = p.temperature {
            obj.insert("temperature".into(), t.into());
        }
        if let Some(v) = p.top_p {
            obj.insert("top_p".into(), v.into());
        }
        if let Some(v) = p.max_tokens {
            obj.insert("max_tokens".into(), v.into());
        }
        if let Some(v) = p.frequency_penalty {
            obj.insert("frequency_penalty".into(), v.into());
        }
        if let Some(v) = p.presence_penalty {
            obj.insert("presence_penalty".into(), v.into());
        }
        if let Some(ref v) = p.stop {
            obj.insert("stop".into(), v.clone().into());
        }
        for (k, v) in &request.extra {
            obj.insert(k.clone(), v.clone());
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    index: u32,
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    index: u32,
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModelList {
    data: Vec<OpenAiModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModel {
    id: String,
    #[serde(default)]
    owned_by: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: u32,
    embedding: Vec<f32>,
}

fn finish_reason(raw: Option<&str>) -> Option<FinishReason> {
    raw.map(|r| match r {
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" => FinishReason::ToolCall,
        _ => FinishReason::Stop,
    })
}

#[async_trait]
impl Adapter for OpenAiChatAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { streaming: true }
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, AdapterError> {
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(self.completions_url())
            .json(&self.body(request, false))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let choices = parsed
            .choices
            .into_iter()
            .map(|c| Choice {
                index: c.index,
                message: ResponseMessage::assistant(c.message.content.unwrap_or_default()),
                finish_reason: finish_reason(c.finish_reason.as_deref()).unwrap_or(FinishReason::Stop),
            })
            .collect();

        let usage = parsed.usage.map_or_else(Usage::default, |u| {
            Usage::new(u.prompt_tokens, u.completion_tokens)
        });

        Ok(InferenceResponse {
            id: String::new(),
            model: request.model_id.clone(),
            choices,
            usage,
            engine: String::new(),
            latency_ms: 0,
        })
    }

    async fn complete_stream(&self, request: &InferenceRequest) -> Result<ChunkStream, AdapterError> {
        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(self.completions_url())
            .json(&self.body(request, true))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        // The lease is moved into the stream so its semaphore permit is
        // held for the full body read, not just the initial response.
        let stream = response.bytes_stream().eventsource().filter_map(move |event| {
            let _lease = &lease;
            async move {
                let event = match event {
                    Ok(e) => e,
                    Err(e) => return Some(Err(AdapterError::Protocol(e.to_string()))),
                };
                if event.data == "[DONE]" {
                    return None;
                }
                match serde_json::from_str::<OpenAiStreamChunk>(&event.data) {
                    Ok(chunk) => {
                        let Some(choice) = chunk.choices.into_iter().next() else {
                            return None;
                        };
                        let usage = chunk.usage.map(|u| Usage::new(u.prompt_tokens, u.completion_tokens));
                        Some(Ok(match finish_reason(choice.finish_reason.as_deref()) {
                            Some(reason) => StreamChunk::terminal(choice.index, reason, usage),
                            None => StreamChunk::content_delta(choice.index, choice.delta.content.unwrap_or_default()),
                        }))
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unparseable stream chunk");
                        None
                    }
                }
            }
        });

        Ok(super::guard_terminator(Box::pin(stream)))
    }

    async fn health_check(&self, timeout: Duration) -> Result<(), AdapterError> {
        let lease = self.pool.acquire().await?;
        let url = self
            .base_url
            .join("health")
            .unwrap_or_else(|_| self.base_url.clone());
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

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AdapterError> {
        let lease = self.pool.acquire().await?;
        let response = lease.client().get(self.models_url()).send().await.map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let parsed: OpenAiModelList = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
                size: None,
                quantization: None,
            })
            .collect())
    }

    async fn embeddings(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, AdapterError> {
        let body = serde_json::json!({
            "model": request.model_id,
            "input": request.input,
        });

        let lease = self.pool.acquire().await?;
        let response = lease
            .client()
            .post(self.embeddings_url())
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream { status, body });
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let usage = parsed.usage.map_or_else(Usage::default, |u| {
            Usage::new(u.prompt_tokens, u.completion_tokens)
        });

        Ok(EmbeddingResponse {
            data: parsed
                .data
                .into_iter()
                .map(|d| Embedding {
                    index: d.index,
                    embedding: d.embedding,
                })
                .collect(),
            usage,
        })
    }
}

fn map_reqwest_err(e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::Timeout
    } else {
        AdapterError::Transport(e.to_string())
    }
}
