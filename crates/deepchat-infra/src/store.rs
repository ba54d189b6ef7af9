//! Entity store selected by configuration.
//!
//! `storage = "sqlite"` opens the database under the data directory;
//! `storage = "memory"` keeps everything in process.

use std::path::Path;

use uuid::Uuid;

use deepchat_core::store::{CommitReceipt, EntityStore, MemoryEntityStore, PendingBatch};
use deepchat_types::config::{DeepChatConfig, StorageBackend};
use deepchat_types::entity::{Chatbot, Conversation, EntityKind, Turn, User};
use deepchat_types::error::StoreError;

use crate::config::database_url;
use crate::sqlite::entity::SqliteEntityStore;
use crate::sqlite::pool::DatabasePool;

/// Either backend behind one concrete type.
pub enum AnyEntityStore {
    Sqlite(SqliteEntityStore),
    Memory(MemoryEntityStore),
}

impl AnyEntityStore {
    /// Open the backend named by `config.storage`.
    pub async fn open(config: &DeepChatConfig, data_dir: &Path) -> Result<Self, StoreError> {
        match config.storage {
            StorageBackend::Memory => {
                tracing::info!("using in-memory entity store");
                Ok(Self::Memory(MemoryEntityStore::new()))
            }
            StorageBackend::Sqlite => {
                let url = database_url(config, data_dir);
                let pool = DatabasePool::new(&url).await.map_err(|e| {
                    StoreError::Persistence(format!("failed to open database {url}: {e}"))
                })?;
                tracing::info!(url = %url, "opened sqlite entity store");
                Ok(Self::Sqlite(SqliteEntityStore::new(pool)))
            }
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Sqlite(_) => StorageBackend::Sqlite,
            Self::Memory(_) => StorageBackend::Memory,
        }
    }

    /// Close database pools, if any.
    pub async fn close(&self) {
        if let Self::Sqlite(store) = self {
            store.pool().close().await;
        }
    }
}

impl EntityStore for AnyEntityStore {
    async fn find_id(&self, kind: EntityKind, lookup_key: &str) -> Result<Option<Uuid>, StoreError> {
        match self {
            Self::Sqlite(s) => s.find_id(kind, lookup_key).await,
            Self::Memory(s) => s.find_id(kind, lookup_key).await,
        }
    }

    async fn commit(&self, batch: PendingBatch) -> Result<CommitReceipt, StoreError> {
        match self {
            Self::Sqlite(s) => s.commit(batch).await,
            Self::Memory(s) => s.commit(batch).await,
        }
    }

    async fn get_user(&self, name: &str) -> Result<Option<User>, StoreError> {
        match self {
            Self::Sqlite(s) => s.get_user(name).await,
            Self::Memory(s) => s.get_user(name).await,
        }
    }

    async fn get_chatbot(&self, name: &str) -> Result<Option<Chatbot>, StoreError> {
        match self {
            Self::Sqlite(s) => s.get_chatbot(name).await,
            Self::Memory(s) => s.get_chatbot(name).await,
        }
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, StoreError> {
        match self {
            Self::Sqlite(s) => s.get_conversation(id).await,
            Self::Memory(s) => s.get_conversation(id).await,
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        match self {
            Self::Sqlite(s) => s.list_users().await,
            Self::Memory(s) => s.list_users().await,
        }
    }

    async fn list_chatbots(&self) -> Result<Vec<Chatbot>, StoreError> {
        match self {
            Self::Sqlite(s) => s.list_chatbots().await,
            Self::Memory(s) => s.list_chatbots().await,
        }
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        match self {
            Self::Sqlite(s) => s.list_conversations().await,
            Self::Memory(s) => s.list_conversations().await,
        }
    }

    async fn list_turns(&self, conversation_id: &Uuid) -> Result<Vec<Turn>, StoreError> {
        match self {
            Self::Sqlite(s) => s.list_turns(conversation_id).await,
            Self::Memory(s) => s.list_turns(conversation_id).await,
        }
    }

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        match self {
            Self::Sqlite(s) => s.count(kind).await,
            Self::Memory(s) => s.count(kind).await,
        }
    }
}
