use serde::{Deserialize, Serialize};

use super::message::Role;
use super::response::{FinishReason, Usage};

/// The incremental piece of a choice carried by one [`StreamChunk`].
/// `role` is only ever present on the first chunk of a choice; `content`
/// is present on every chunk that adds text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One chunk of a streamed completion.
///
/// Ordering per stream is strictly monotonic in emission order; the
/// terminal chunk always carries `finish_reason` and is the last chunk
/// to be yielded — no chunks follow it (spec.md §3's streaming
/// invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub index: u32,
    pub delta: StreamDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Populated on the terminal chunk when the engine reports native
    /// usage counts; not part of spec.md's minimal `StreamChunk` shape
    /// but harmless to surface when available, and cheaper than a
    /// second round-trip to recover it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }

    #[must_use]
    pub fn content_delta(index: u32, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            index,
            delta: StreamDelta {
                role: None,
                content: Some(content.into()),
            },
            finish_reason: None,
            usage: None,
        }
    }

    #[must_use]
    pub fn terminal(index: u32, finish_reason: FinishReason, usage: Option<Usage>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            index,
            delta: StreamDelta::default(),
            finish_reason: Some(finish_reason),
            usage,
        }
    }

    /// Fill in the id/model fields the adapter doesn't know at decode
    /// time; called by the router before a chunk reaches the caller.
    pub fn stamp(&mut self, id: &str, model: &str) {
        id.clone_into(&mut self.id);
        model.clone_into(&mut self.model);
    }
}
