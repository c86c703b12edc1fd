use serde::{Deserialize, Serialize};

use super::response::Usage;

/// Request to embed one or more texts against a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model_id: String,
    pub input: Vec<String>,
}

/// One embedding vector, at the same index as its source text in
/// [`EmbeddingRequest::input`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub index: u32,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<Embedding>,
    pub usage: Usage,
}
