use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{Message, Role};

/// Parameters controlling text generation, shared across every engine.
///
/// Fields an engine's wire protocol doesn't support are simply dropped
/// by that engine's adapter rather than causing an error — spec'd
/// sampling knobs are a superset, not a contract every upstream honors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    /// `[0, 2]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// `(0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// `>= -1`; `-1` means "disabled" on the engines that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    /// `>= 1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

impl SamplingParams {
    /// `repetition_penalty = 1 + frequency_penalty`, the mapping spec.md
    /// §4.1 gives for engines with no native frequency-penalty field.
    #[must_use]
    pub fn repetition_penalty(&self) -> Option<f32> {
        self.frequency_penalty.map(|fp| 1.0 + fp)
    }
}

const fn role_tag(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Canonical inference request passed from the router into an adapter.
///
/// Exactly one of `messages`/`prompt` is populated on a well-formed
/// request (the server layer enforces this at the wire boundary);
/// adapters that only speak the other shape call [`Self::messages`] or
/// [`Self::prompt`] to get a uniform view regardless of which arrived.
///
/// Immutable once constructed; the router shares one instance across
/// every candidate it retries against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub params: SamplingParams,
    #[serde(default)]
    pub stream: bool,
    /// Engine-specific knobs passed through verbatim in the outgoing
    /// wire body for engines with a JSON-object protocol.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl InferenceRequest {
    /// A message-sequence view of this request, synthesizing a single
    /// user turn when the request arrived as a raw `prompt`.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        match &self.messages {
            Some(messages) => messages.clone(),
            None => vec![Message::new(Role::User, self.prompt.clone().unwrap_or_default())],
        }
    }

    /// A flattened prompt view of this request for engines with no
    /// native chat-message protocol: `<|role|>\n...</s>` concatenation
    /// per spec.md §4.1's TGI/DeepSpeed prompt format column.
    #[must_use]
    pub fn prompt(&self) -> String {
        match &self.prompt {
            Some(prompt) => prompt.clone(),
            None => self
                .messages
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|m| format!("<|{}|>\n{}</s>", role_tag(m.role), m.content.as_text()))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
