//! The `Adapter` trait and one module per inference engine protocol.

mod deepspeed;
mod ollama;
mod openai_chat;
mod tgi;
mod trtllm;

pub use deepspeed::DeepspeedAdapter;
pub use ollama::OllamaAdapter;
pub use openai_chat::OpenAiChatAdapter;
pub use tgi::TgiAdapter;
pub use trtllm::TrtLlmAdapter;

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::AdapterError;
use crate::types::{EmbeddingRequest, EmbeddingResponse, InferenceRequest, InferenceResponse, ModelInfo, StreamChunk};

/// What an adapter's upstream engine supports.
#[derive(Debug, Clone, Copy)]
pub struct AdapterCapabilities {
    pub streaming: bool,
}

/// A boxed stream of chunks, yielded one per SSE/NDJSON frame.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AdapterError>> + Send>>;

/// Wraps a raw per-engine chunk stream so every adapter honors the same
/// two invariants without repeating the bookkeeping: nothing is
/// yielded after a terminal chunk, and a stream that closes without
/// ever producing one surfaces `AdapterError::Protocol` as its final
/// item instead of silently stopping (spec.md §4.1: "a stream that
/// never yields a terminator before the HTTP connection closes fails
/// with `ProtocolError`").
struct GuardTerminator {
    inner: ChunkStream,
    done: bool,
}

impl Stream for GuardTerminator {
    type Item = Result<StreamChunk, AdapterError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.done = chunk.is_terminal();
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(Some(Err(AdapterError::Protocol(
                    "stream closed before a terminal chunk was received".to_owned(),
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Apply the terminator guard to an adapter's raw chunk stream. Every
/// `Adapter::complete_stream` implementation should return its stream
/// wrapped through this before handing it back to the router.
#[must_use]
pub fn guard_terminator(inner: ChunkStream) -> ChunkStream {
    Box::pin(GuardTerminator { inner, done: false })
}

/// Uniform interface the router, pool, and breaker drive every engine
/// integration through. Implementations translate [`InferenceRequest`]
/// into the engine's wire protocol and translate the response back.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Engine identity, used in logs and metrics labels.
    fn name(&self) -> &str;

    fn capabilities(&self) -> AdapterCapabilities;

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, AdapterError>;

    async fn complete_stream(&self, request: &InferenceRequest) -> Result<ChunkStream, AdapterError>;

    /// Lightweight liveness probe used by the health monitor's periodic
    /// sweep. Adapters that have no dedicated health endpoint fall back
    /// to a cheap `GET` on their base URL.
    async fn health_check(&self, timeout: Duration) -> Result<(), AdapterError>;

    /// Models the upstream currently reports as loaded. Adapters whose
    /// engine has no discovery endpoint fail with `Unsupported`; the
    /// registry falls back to its own static configuration for them.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, AdapterError> {
        Err(AdapterError::Unsupported(format!("{} does not support model listing", self.name())))
    }

    /// Embed a batch of texts. Adapters fronting an engine with no
    /// embedding endpoint fail with `Unsupported`.
    async fn embeddings(&self, _request: &EmbeddingRequest) -> Result<EmbeddingResponse, AdapterError> {
        Err(AdapterError::Unsupported(format!("{} does not support embeddings", self.name())))
    }
}
