//! InferenceEngine and EngineLoader trait definitions.
//!
//! Engines are opaque: a message goes in, a response comes out. Loading is a
//! separate step so the registry can decide when to pay for it.

use deepchat_types::error::EngineError;

use super::box_engine::BoxEngine;

/// A loaded model that can answer chat messages.
pub trait InferenceEngine: Send + Sync {
    /// Identity this engine was loaded for (e.g. "cornell").
    fn name(&self) -> &str;

    /// Generate a response to one user message.
    fn respond(
        &self,
        message: &str,
    ) -> impl std::future::Future<Output = Result<String, EngineError>> + Send;

    /// Free whatever the engine holds. Called by the registry when the engine
    /// is swapped out; the engine is dropped right after.
    fn release(&self) -> impl std::future::Future<Output = Result<(), EngineError>> + Send {
        async { Ok(()) }
    }
}

/// Builds the engine for a bot identity.
///
/// Implementations live in deepchat-infra (e.g. `FrozenModelLoader`).
pub trait EngineLoader: Send + Sync {
    fn load(
        &self,
        identity: &str,
    ) -> impl std::future::Future<Output = Result<BoxEngine, EngineError>> + Send;
}
