//! Application state wiring the chat service together.
//!
//! `ChatService` is generic over the entity store and the engine loader;
//! `AppState` pins it to the concrete infra implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use deepchat_core::chat::ChatService;
use deepchat_core::conversation::ConversationResolver;
use deepchat_core::engine::BotBindingRegistry;
use deepchat_infra::config::models_dir;
use deepchat_infra::engine::FrozenModelLoader;
use deepchat_infra::store::AnyEntityStore;
use deepchat_types::config::DeepChatConfig;

use crate::http::session::SessionStore;

/// Chat service pinned to the configured store and the frozen model loader.
pub type ConcreteChatService = ChatService<AnyEntityStore, FrozenModelLoader>;

/// Shared application state.
///
/// Used by both CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<DeepChatConfig>,
}

impl AppState {
    /// Open the configured store and wire the chat service.
    pub async fn init(config: DeepChatConfig, data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let store = AnyEntityStore::open(&config, &data_dir).await?;
        Ok(Self::from_parts(config, &data_dir, store))
    }

    /// Wire the chat service around an already opened store.
    pub fn from_parts(config: DeepChatConfig, data_dir: &Path, store: AnyEntityStore) -> Self {
        let loader = FrozenModelLoader::new(models_dir(&config, data_dir));
        let registry = if config.testing {
            BotBindingRegistry::testing(loader)
        } else {
            BotBindingRegistry::new(loader, config.engine_load_timeout())
        };
        let resolver = ConversationResolver::new(
            store,
            config.conversation_keying,
            config.commit_timeout(),
            config.default_user.clone(),
        );

        Self {
            chat_service: Arc::new(ChatService::new(resolver, registry)),
            sessions: Arc::new(SessionStore::new(
                config.session_idle_timeout(),
                config.max_sessions,
            )),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &AnyEntityStore {
        self.chat_service.resolver().store()
    }

    /// Release the bound engine and close the store.
    pub async fn shutdown(&self) {
        self.chat_service.registry().unbind().await;
        self.store().close().await;
    }
}
