//! Registry-specific error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown model id: {0}")]
    UnknownModel(String),

    #[error("duplicate registration for {engine_type}:{endpoint}")]
    DuplicateEntry { engine_type: String, endpoint: String },

    #[error("registry is sealed; no further entries can be added")]
    Sealed,
}
