//! Canonical request/response/stream types shared by every adapter.
//!
//! Each engine speaks its own wire protocol; adapters translate to and
//! from these types so the router, breaker, and pool never see a
//! vLLM/TGI/Ollama-shaped value.

pub mod discovery;
pub mod embedding;
pub mod message;
pub mod request;
pub mod response;
pub mod stream;

pub use discovery::ModelInfo;
pub use embedding::{Embedding, EmbeddingRequest, EmbeddingResponse};
pub use message::{Content, Message, Role};
pub use request::{InferenceRequest, SamplingParams};
pub use response::{Choice, FinishReason, InferenceResponse, ResponseMessage, Usage};
pub use stream::{StreamChunk, StreamDelta};
