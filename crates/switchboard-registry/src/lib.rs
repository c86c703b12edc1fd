//! The model registry: append-only during boot, read-only after seal.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::{Capability, ModelEntry, ModelRegistry, ModelRegistryBuilder};
