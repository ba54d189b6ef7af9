//! EntityStore trait definition.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition), the same
//! pattern as the other ports in this crate.

use deepchat_types::entity::{Chatbot, Conversation, EntityKind, Turn, User};
use deepchat_types::error::StoreError;
use uuid::Uuid;

use super::{CommitReceipt, PendingBatch};

/// Durable storage for the four entity kinds.
///
/// Implementations: [`super::MemoryEntityStore`] here, `SqliteEntityStore`
/// in deepchat-infra.
pub trait EntityStore: Send + Sync {
    /// Look up the id of the entity of `kind` whose identity key equals
    /// `lookup_key` (the name for users/chatbots, the policy-derived lookup
    /// key for conversations).
    ///
    /// Turns have no identity key; asking for one is a configuration error.
    fn find_id(
        &self,
        kind: EntityKind,
        lookup_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Uuid>, StoreError>> + Send;

    /// Apply a staged batch as one atomic unit.
    ///
    /// Keyed entities are inserted only if their key is absent; otherwise the
    /// existing row's id is reported in the receipt. Turns are always inserted.
    /// On error nothing from the batch is visible to later reads.
    fn commit(
        &self,
        batch: PendingBatch,
    ) -> impl std::future::Future<Output = Result<CommitReceipt, StoreError>> + Send;

    /// Get a user by display name.
    fn get_user(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Get a chatbot by display name.
    fn get_chatbot(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Chatbot>, StoreError>> + Send;

    /// Get a conversation by id.
    fn get_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, StoreError>> + Send;

    /// List users ordered by creation.
    fn list_users(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<User>, StoreError>> + Send;

    /// List chatbots ordered by creation.
    fn list_chatbots(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Chatbot>, StoreError>> + Send;

    /// List conversations ordered by creation.
    fn list_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, StoreError>> + Send;

    /// Turns of one conversation in the order they were recorded.
    fn list_turns(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, StoreError>> + Send;

    /// Number of rows of a kind.
    fn count(
        &self,
        kind: EntityKind,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}
