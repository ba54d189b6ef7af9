//! Inference engine implementations.
//!
//! - `FrozenModelLoader`: `EngineLoader` that reads a model's serving descriptor
//! - `HttpEngine`: `InferenceEngine` that forwards messages to the model server

pub mod frozen;
pub mod http;

pub use frozen::{EngineDescriptor, FrozenModelLoader};
pub use http::HttpEngine;
