//! Per-engine wire protocol adapters for the inference routing core.
//!
//! Translates the canonical [`InferenceRequest`]/[`InferenceResponse`]/
//! [`StreamChunk`] triple to and from each upstream engine's own
//! protocol behind the single [`Adapter`] trait.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod engines;
pub mod error;
pub mod types;
pub mod usage;

pub use engines::{Adapter, AdapterCapabilities, ChunkStream, guard_terminator};
pub use error::AdapterError;
pub use types::{
    Choice, Content, Embedding, EmbeddingRequest, EmbeddingResponse, FinishReason, InferenceRequest, InferenceResponse,
    Message, ModelInfo, ResponseMessage, Role, SamplingParams, StreamChunk, StreamDelta, Usage,
};
