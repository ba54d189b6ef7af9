//! BoxEngine -- object-safe dynamic dispatch wrapper for InferenceEngine.
//!
//! Same blanket-impl shape as the other boxed ports:
//! 1. Define an object-safe `InferenceEngineDyn` trait with boxed futures
//! 2. Blanket-impl `InferenceEngineDyn` for all `T: InferenceEngine`
//! 3. `BoxEngine` wraps `Box<dyn InferenceEngineDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use deepchat_types::error::EngineError;

use super::inference::InferenceEngine;

/// Object-safe version of [`InferenceEngine`] with boxed futures.
pub trait InferenceEngineDyn: Send + Sync {
    fn name(&self) -> &str;

    fn respond_boxed<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EngineError>> + Send + 'a>>;

    fn release_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + '_>>;
}

impl<T: InferenceEngine> InferenceEngineDyn for T {
    fn name(&self) -> &str {
        InferenceEngine::name(self)
    }

    fn respond_boxed<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EngineError>> + Send + 'a>> {
        Box::pin(self.respond(message))
    }

    fn release_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + '_>> {
        Box::pin(self.release())
    }
}

/// Type-erased inference engine.
///
/// `InferenceEngine` uses RPITIT and cannot be a trait object directly, so the
/// registry stores engines as `BoxEngine`.
pub struct BoxEngine {
    inner: Box<dyn InferenceEngineDyn + Send + Sync>,
}

impl BoxEngine {
    pub fn new<T: InferenceEngine + 'static>(engine: T) -> Self {
        Self {
            inner: Box::new(engine),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn respond(&self, message: &str) -> Result<String, EngineError> {
        self.inner.respond_boxed(message).await
    }

    pub async fn release(&self) -> Result<(), EngineError> {
        self.inner.release_boxed().await
    }
}

impl std::fmt::Debug for BoxEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxEngine")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReverseEngine;

    #[tokio::test]
    async fn test_box_engine_delegates() {
        let engine = BoxEngine::new(ReverseEngine::new());
        assert_eq!(engine.name(), "Reverse TestBot");
        assert_eq!(engine.respond("abc").await.unwrap(), "cba");
        engine.release().await.unwrap();
    }
}
