//! Shared foundation types for the inference routing core.
//!
//! Every component crate depends on `switchboard-core` for the
//! [`HttpError`] trait that lets domain errors describe themselves to
//! the HTTP layer without depending on axum.

mod error;
mod ids;

pub use error::HttpError;
pub use ids::EngineType;
