//! Inference engine abstractions and the bot binding registry.
//!
//! - `InferenceEngine`: RPITIT trait for concrete engines
//! - `EngineLoader`: builds an engine for a bot identity
//! - `BoxEngine`: object-safe wrapper so differently-typed engines can share a slot
//! - `BotBindingRegistry`: the one engine currently bound in this process

pub mod box_engine;
pub mod identity;
pub mod inference;
pub mod registry;
pub mod reverse;

pub use box_engine::BoxEngine;
pub use inference::{EngineLoader, InferenceEngine};
pub use registry::{BotBindingRegistry, BoundEngine};
pub use reverse::ReverseEngine;
