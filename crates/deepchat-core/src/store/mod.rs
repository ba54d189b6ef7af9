//! Entity store port and the staging types shared by its implementations.
//!
//! Writes never go straight to storage. A [`UnitOfWork`] stages entities in an
//! arena and hands the whole [`PendingBatch`] to [`EntityStore::commit`], which
//! applies it atomically with insert-if-absent semantics per identity key.

pub mod memory;
pub mod repository;
pub mod unit_of_work;

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use deepchat_types::entity::{ConversationKeying, EntityKind};
use deepchat_types::error::StoreError;

pub use memory::MemoryEntityStore;
pub use repository::EntityStore;
pub use unit_of_work::{Attributes, UnitOfWork};

/// Handle to an entity seen by a unit of work.
///
/// `Persisted` carries the id of a row that already exists. `Pending` is an
/// index into the unit of work's staging arena; its final id is only known
/// once the batch is committed (see [`CommitReceipt::id_of`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Persisted(Uuid),
    Pending(usize),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Persisted(id) => write!(f, "{id}"),
            EntityRef::Pending(index) => write!(f, "pending#{index}"),
        }
    }
}

/// An entity staged for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEntity {
    User {
        id: Uuid,
        name: String,
    },
    Chatbot {
        id: Uuid,
        name: String,
    },
    Conversation {
        id: Uuid,
        start_time: String,
        user: EntityRef,
        chatbot: EntityRef,
        keying: ConversationKeying,
    },
    Turn {
        id: Uuid,
        conversation: EntityRef,
        user_message: String,
        chatbot_message: String,
    },
}

impl PendingEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            PendingEntity::User { .. } => EntityKind::User,
            PendingEntity::Chatbot { .. } => EntityKind::Chatbot,
            PendingEntity::Conversation { .. } => EntityKind::Conversation,
            PendingEntity::Turn { .. } => EntityKind::Turn,
        }
    }

    /// Id assigned at staging time. The committed row may carry a different
    /// id if another writer inserted the same key first.
    pub fn staged_id(&self) -> Uuid {
        match self {
            PendingEntity::User { id, .. }
            | PendingEntity::Chatbot { id, .. }
            | PendingEntity::Conversation { id, .. }
            | PendingEntity::Turn { id, .. } => *id,
        }
    }
}

/// Everything one unit of work staged, in staging order.
///
/// Parents are always staged before the entities that reference them, so
/// a `Pending(i)` ref inside entity `j` satisfies `i < j`.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    entities: Vec<PendingEntity>,
    staged_at: DateTime<Utc>,
}

impl PendingBatch {
    pub fn new(entities: Vec<PendingEntity>) -> Self {
        Self {
            entities,
            staged_at: Utc::now(),
        }
    }

    pub fn entities(&self) -> &[PendingEntity] {
        &self.entities
    }

    pub fn staged_at(&self) -> DateTime<Utc> {
        self.staged_at
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Resolve a ref against the ids a commit has assigned so far.
///
/// Used by store implementations while applying a batch in order.
pub fn resolve_ref(entity_ref: EntityRef, assigned: &[Uuid]) -> Result<Uuid, StoreError> {
    match entity_ref {
        EntityRef::Persisted(id) => Ok(id),
        EntityRef::Pending(index) => assigned.get(index).copied().ok_or_else(|| {
            StoreError::Configuration(format!(
                "{entity_ref} refers to an entity staged after its dependant"
            ))
        }),
    }
}

/// Outcome of a successful commit: the final id of every staged entity and
/// whether it was newly inserted or matched an existing row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub ids: Vec<Uuid>,
    pub inserted: Vec<bool>,
}

impl CommitReceipt {
    pub fn push(&mut self, id: Uuid, inserted: bool) {
        self.ids.push(id);
        self.inserted.push(inserted);
    }

    pub fn id_of(&self, entity_ref: EntityRef) -> Option<Uuid> {
        match entity_ref {
            EntityRef::Persisted(id) => Some(id),
            EntityRef::Pending(index) => self.ids.get(index).copied(),
        }
    }

    /// False for persisted refs and for pending entities that converged on a
    /// row another writer created first.
    pub fn was_inserted(&self, entity_ref: EntityRef) -> bool {
        match entity_ref {
            EntityRef::Persisted(_) => false,
            EntityRef::Pending(index) => self.inserted.get(index).copied().unwrap_or(false),
        }
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.iter().filter(|i| **i).count()
    }
}
