//! Bot binding registry.
//!
//! Holds at most one loaded engine per process and the identity it was loaded
//! for. A request for a different identity loads a new engine and swaps it in;
//! the outgoing engine is released before it is dropped.
//!
//! The binding is behind one async mutex. [`BotBindingRegistry::bind`] returns
//! a [`BoundEngine`] that keeps the lock, so no other request can swap the
//! engine between binding it and using it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use deepchat_types::error::EngineError;

use super::box_engine::BoxEngine;
use super::identity::TEST_BOT_NAME;
use super::inference::EngineLoader;
use super::reverse::ReverseEngine;

/// The engine currently bound and the identity it serves.
#[derive(Debug)]
pub struct ActiveBinding {
    identity: String,
    engine: BoxEngine,
}

/// Exclusive access to the bound engine.
///
/// Holds the registry lock until dropped.
#[derive(Debug)]
pub struct BoundEngine<'a> {
    binding: MappedMutexGuard<'a, ActiveBinding>,
}

impl BoundEngine<'_> {
    pub fn identity(&self) -> &str {
        &self.binding.identity
    }

    pub fn engine(&self) -> &BoxEngine {
        &self.binding.engine
    }

    pub async fn respond(&self, message: &str) -> Result<String, EngineError> {
        self.binding.engine.respond(message).await
    }
}

/// Process-wide owner of the loaded inference engine.
///
/// Owned by the chat service and shared by reference with every request.
pub struct BotBindingRegistry<L: EngineLoader> {
    loader: L,
    testing: bool,
    load_timeout: Duration,
    binding: Mutex<Option<ActiveBinding>>,
    loads: AtomicU64,
}

impl<L: EngineLoader> BotBindingRegistry<L> {
    /// Registry that loads engines on demand through `loader`.
    pub fn new(loader: L, load_timeout: Duration) -> Self {
        Self {
            loader,
            testing: false,
            load_timeout,
            binding: Mutex::new(None),
            loads: AtomicU64::new(0),
        }
    }

    /// Registry for test configuration: every bind gets the fixed
    /// [`ReverseEngine`] and `loader` is never called.
    pub fn testing(loader: L) -> Self {
        Self {
            loader,
            testing: true,
            load_timeout: Duration::ZERO,
            binding: Mutex::new(Some(ActiveBinding {
                identity: TEST_BOT_NAME.to_string(),
                engine: BoxEngine::new(ReverseEngine::new()),
            })),
            loads: AtomicU64::new(0),
        }
    }

    pub fn is_testing(&self) -> bool {
        self.testing
    }

    /// How many times the loader has been invoked successfully.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Identity of the currently bound engine, if any.
    ///
    /// Waits for any in-flight bind/use to finish.
    pub async fn current_identity(&self) -> Option<String> {
        self.binding.lock().await.as_ref().map(|b| b.identity.clone())
    }

    /// Bind the engine for `identity`, loading it if a different one (or none)
    /// is bound.
    ///
    /// On load failure or timeout the previous binding is left untouched.
    pub async fn bind(&self, identity: &str) -> Result<BoundEngine<'_>, EngineError> {
        let mut guard = self.binding.lock().await;

        let reuse = self.testing || matches!(&*guard, Some(b) if b.identity == identity);
        if reuse {
            debug!(identity, "reusing bound engine");
        } else {
            let engine = self.load(identity).await?;
            self.loads.fetch_add(1, Ordering::Relaxed);

            if let Some(previous) = guard.take() {
                info!(from = %previous.identity, to = identity, "swapping bot binding");
                release(previous).await;
            } else {
                info!(identity, "bot binding established");
            }

            *guard = Some(ActiveBinding {
                identity: identity.to_string(),
                engine,
            });
        }

        MutexGuard::try_map(guard, |binding| binding.as_mut())
            .map(|binding| BoundEngine { binding })
            .map_err(|_| EngineError::load(identity, "no engine bound"))
    }

    /// Bind `identity` and generate a response under the same lock.
    pub async fn respond(&self, identity: &str, message: &str) -> Result<String, EngineError> {
        let bound = self.bind(identity).await?;
        bound.respond(message).await
    }

    /// Release and drop the bound engine. Used on process shutdown.
    pub async fn unbind(&self) {
        if self.testing {
            return;
        }
        if let Some(previous) = self.binding.lock().await.take() {
            info!(identity = %previous.identity, "releasing bot binding");
            release(previous).await;
        }
    }

    async fn load(&self, identity: &str) -> Result<BoxEngine, EngineError> {
        match tokio::time::timeout(self.load_timeout, self.loader.load(identity)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::load(
                identity,
                format!("load timed out after {}ms", self.load_timeout.as_millis()),
            )),
        }
    }
}

async fn release(binding: ActiveBinding) {
    if let Err(e) = binding.engine.release().await {
        warn!(identity = %binding.identity, error = %e, "engine release failed");
    }
}
