use serde::{Deserialize, Serialize};

use super::message::{Content, Role};

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCall,
}

/// Token usage statistics. `total_tokens` is always
/// `prompt_tokens + completion_tokens`; adapters that front an engine
/// with no native counts fall back to the shared word-count estimator
/// in [`crate::usage`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    #[must_use]
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// The assistant turn produced by a single choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    pub content: Content,
}

impl ResponseMessage {
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }
}

/// A single generated completion. `index` always matches its position
/// in [`InferenceResponse::choices`](super::InferenceResponse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: FinishReason,
}

/// Canonical inference response handed back from an adapter to the
/// router, regardless of which engine produced it.
///
/// `id` and `engine` are not known to the adapter that produced the
/// completion: `id` is minted and `engine` is stamped by the router
/// once a candidate has actually succeeded (spec.md §3's invariant
/// that every successful response names the upstream that served it).
/// Adapters populate every other field and leave these at their
/// defaults; [`InferenceResponse::stamp`] fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub latency_ms: u64,
}

impl InferenceResponse {
    /// Fill in the fields only the router can know: which upstream
    /// served the call, an opaque response id, and the wall-clock
    /// latency of the winning attempt.
    pub fn stamp(&mut self, id: String, engine: String, latency_ms: u64) {
        self.id = id;
        self.engine = engine;
        self.latency_ms = latency_ms;
    }
}
