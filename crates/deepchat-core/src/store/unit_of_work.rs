//! Get-or-create staging over an [`EntityStore`].
//!
//! A `UnitOfWork` is the pending-write set for one exchange. `resolve`
//! answers "does this key exist?" from, in order, its own staging index and
//! the store, and stages a new entity only on a miss. Nothing reaches storage
//! until [`UnitOfWork::commit`].

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use deepchat_types::entity::{ConversationKeying, EntityKind};
use deepchat_types::error::StoreError;

use super::repository::EntityStore;
use super::{CommitReceipt, EntityRef, PendingBatch, PendingEntity};

/// Non-key attributes supplied with a resolve.
///
/// On a hit they are ignored; on a miss they are merged with the key into
/// the new entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    /// Users and chatbots carry nothing beyond their name.
    None,
    Conversation {
        user: EntityRef,
        chatbot: EntityRef,
    },
    Turn {
        conversation: EntityRef,
        user_message: String,
        chatbot_message: String,
    },
}

/// Pending-write set for one exchange.
pub struct UnitOfWork<'s, S: EntityStore> {
    store: &'s S,
    keying: ConversationKeying,
    commit_timeout: Duration,
    pending: Vec<PendingEntity>,
    index: HashMap<(EntityKind, String), EntityRef>,
}

impl<'s, S: EntityStore> UnitOfWork<'s, S> {
    pub fn new(store: &'s S, keying: ConversationKeying, commit_timeout: Duration) -> Self {
        Self {
            store,
            keying,
            commit_timeout,
            pending: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of staged, uncommitted entities.
    pub fn staged_count(&self) -> usize {
        self.pending.len()
    }

    pub fn staged(&self) -> &[PendingEntity] {
        &self.pending
    }

    /// Get-or-create an entity of `kind` by its identity key.
    ///
    /// `key` is the value of the kind's key field: the name for users and
    /// chatbots, the session marker for conversations. Resolving the same key
    /// twice returns the same handle.
    pub async fn resolve(
        &mut self,
        kind: EntityKind,
        key: &str,
        defaults: Attributes,
    ) -> Result<EntityRef, StoreError> {
        let (lookup_key, queryable) = match (kind, &defaults) {
            (EntityKind::Turn, _) => {
                return Err(StoreError::Configuration(
                    "turn has no identity key; use resolve_unconditional".to_string(),
                ));
            }
            (EntityKind::User | EntityKind::Chatbot, Attributes::None) => (key.to_string(), true),
            (EntityKind::Conversation, Attributes::Conversation { user, chatbot }) => {
                self.check_ref(*user, EntityKind::User)?;
                self.check_ref(*chatbot, EntityKind::Chatbot)?;
                self.conversation_key(*user, *chatbot, key)
            }
            (kind, _) => {
                return Err(StoreError::Configuration(format!(
                    "attributes do not belong to kind '{kind}'"
                )));
            }
        };

        if let Some(existing) = self.index.get(&(kind, lookup_key.clone())) {
            debug!(%kind, key, handle = %existing, "resolved from unit of work");
            return Ok(*existing);
        }

        // A composite key built from a pending parent cannot exist in storage yet.
        if queryable {
            if let Some(id) = self.store.find_id(kind, &lookup_key).await? {
                debug!(%kind, key, %id, "resolved existing entity");
                let handle = EntityRef::Persisted(id);
                self.index.insert((kind, lookup_key), handle);
                return Ok(handle);
            }
        }

        let entity = match defaults {
            Attributes::None if kind == EntityKind::User => PendingEntity::User {
                id: Uuid::now_v7(),
                name: key.to_string(),
            },
            Attributes::None => PendingEntity::Chatbot {
                id: Uuid::now_v7(),
                name: key.to_string(),
            },
            Attributes::Conversation { user, chatbot } => PendingEntity::Conversation {
                id: Uuid::now_v7(),
                start_time: key.to_string(),
                user,
                chatbot,
                keying: self.keying,
            },
            Attributes::Turn { .. } => {
                return Err(StoreError::Configuration(
                    "turn attributes passed to resolve".to_string(),
                ));
            }
        };

        let handle = self.stage(entity);
        debug!(%kind, key, %handle, "staged new entity");
        self.index.insert((kind, lookup_key), handle);
        Ok(handle)
    }

    /// Stage a new entity without any lookup. Only valid for turns.
    pub fn resolve_unconditional(
        &mut self,
        kind: EntityKind,
        attributes: Attributes,
    ) -> Result<EntityRef, StoreError> {
        if kind.is_keyed() {
            return Err(StoreError::Configuration(format!(
                "'{kind}' has an identity key; use resolve"
            )));
        }

        match attributes {
            Attributes::Turn {
                conversation,
                user_message,
                chatbot_message,
            } => {
                self.check_ref(conversation, EntityKind::Conversation)?;
                Ok(self.stage(PendingEntity::Turn {
                    id: Uuid::now_v7(),
                    conversation,
                    user_message,
                    chatbot_message,
                }))
            }
            _ => Err(StoreError::Configuration(format!(
                "attributes do not belong to kind '{kind}'"
            ))),
        }
    }

    /// Persist everything staged, all or nothing.
    ///
    /// An empty unit of work commits trivially without touching the store.
    ///
    /// The store commit is bounded by the commit timeout. A timeout reports
    /// a `Persistence` error, but a store that was already finishing its
    /// transaction may still have made the batch durable. Keyed entities
    /// converge on a resubmit; the turn is appended again.
    pub async fn commit(self) -> Result<CommitReceipt, StoreError> {
        if self.pending.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let batch = PendingBatch::new(self.pending);
        let staged = batch.len();

        match tokio::time::timeout(self.commit_timeout, self.store.commit(batch)).await {
            Ok(Ok(receipt)) => {
                debug!(staged, inserted = receipt.inserted_count(), "unit of work committed");
                Ok(receipt)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StoreError::Persistence(format!(
                "commit timed out after {}ms",
                self.commit_timeout.as_millis()
            ))),
        }
    }

    fn stage(&mut self, entity: PendingEntity) -> EntityRef {
        self.pending.push(entity);
        EntityRef::Pending(self.pending.len() - 1)
    }

    fn check_ref(&self, entity_ref: EntityRef, expected: EntityKind) -> Result<(), StoreError> {
        match entity_ref {
            EntityRef::Persisted(_) => Ok(()),
            EntityRef::Pending(index) => match self.pending.get(index) {
                Some(entity) if entity.kind() == expected => Ok(()),
                Some(entity) => Err(StoreError::Configuration(format!(
                    "{entity_ref} is a {}, expected a {expected}",
                    entity.kind()
                ))),
                None => Err(StoreError::Configuration(format!(
                    "{entity_ref} is not staged in this unit of work"
                ))),
            },
        }
    }

    fn conversation_key(&self, user: EntityRef, chatbot: EntityRef, start_time: &str) -> (String, bool) {
        match (self.keying, user, chatbot) {
            (ConversationKeying::Marker, _, _) => (start_time.to_string(), true),
            (ConversationKeying::Composite, EntityRef::Persisted(u), EntityRef::Persisted(c)) => {
                (self.keying.lookup_key(&u, &c, start_time), true)
            }
            (ConversationKeying::Composite, u, c) => (format!("{u}/{c}/{start_time}"), false),
        }
    }
}
