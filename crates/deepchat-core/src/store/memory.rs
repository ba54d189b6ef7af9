//! In-memory entity store.
//!
//! Arena tables (one `Vec` per kind) with key and id indexes, behind a single
//! mutex. A commit first checks every reference in the batch against the live
//! tables, then applies the batch in place. Once the check passes the apply
//! cannot fail, so a rejected batch leaves the tables untouched.

use std::collections::HashMap;
use std::future::{ready, Future};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use deepchat_types::entity::{Chatbot, Conversation, EntityKind, Turn, User};
use deepchat_types::error::StoreError;

use super::repository::EntityStore;
use super::{resolve_ref, CommitReceipt, EntityRef, PendingBatch, PendingEntity};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    chatbots: Vec<Chatbot>,
    conversations: Vec<Conversation>,
    turns: Vec<Turn>,
    user_by_name: HashMap<String, usize>,
    chatbot_by_name: HashMap<String, usize>,
    conversation_by_key: HashMap<String, usize>,
    kind_by_id: HashMap<Uuid, EntityKind>,
}

impl Tables {
    fn expect_kind(&self, id: Uuid, expected: EntityKind) -> Result<(), StoreError> {
        match self.kind_by_id.get(&id) {
            Some(kind) if *kind == expected => Ok(()),
            _ => Err(StoreError::Persistence(format!(
                "foreign key violation: no {expected} with id {id}"
            ))),
        }
    }

    /// Check that every reference in `batch` points at an entity of the right
    /// kind, either already stored or staged earlier in the same batch.
    fn validate(&self, batch: &PendingBatch) -> Result<(), StoreError> {
        let entities = batch.entities();
        let check = |position: usize, entity_ref: EntityRef, expected: EntityKind| match entity_ref {
            EntityRef::Persisted(id) => self.expect_kind(id, expected),
            EntityRef::Pending(index) if index < position => {
                if entities[index].kind() == expected {
                    Ok(())
                } else {
                    Err(StoreError::Persistence(format!(
                        "foreign key violation: {entity_ref} is not a {expected}"
                    )))
                }
            }
            EntityRef::Pending(_) => Err(StoreError::Configuration(format!(
                "{entity_ref} refers to an entity staged after its dependant"
            ))),
        };

        for (position, entity) in entities.iter().enumerate() {
            match entity {
                PendingEntity::Conversation { user, chatbot, .. } => {
                    check(position, *user, EntityKind::User)?;
                    check(position, *chatbot, EntityKind::Chatbot)?;
                }
                PendingEntity::Turn { conversation, .. } => {
                    check(position, *conversation, EntityKind::Conversation)?;
                }
                PendingEntity::User { .. } | PendingEntity::Chatbot { .. } => {}
            }
        }
        Ok(())
    }

    /// Apply a batch that passed [`Tables::validate`].
    fn apply(&mut self, batch: &PendingBatch) -> Result<CommitReceipt, StoreError> {
        let mut receipt = CommitReceipt::default();

        for entity in batch.entities() {
            let created_at = Utc::now();
            match entity {
                PendingEntity::User { id, name } => {
                    if let Some(&row) = self.user_by_name.get(name) {
                        receipt.push(self.users[row].id, false);
                    } else {
                        self.user_by_name.insert(name.clone(), self.users.len());
                        self.kind_by_id.insert(*id, EntityKind::User);
                        self.users.push(User {
                            id: *id,
                            name: name.clone(),
                            created_at,
                        });
                        receipt.push(*id, true);
                    }
                }
                PendingEntity::Chatbot { id, name } => {
                    if let Some(&row) = self.chatbot_by_name.get(name) {
                        receipt.push(self.chatbots[row].id, false);
                    } else {
                        self.chatbot_by_name.insert(name.clone(), self.chatbots.len());
                        self.kind_by_id.insert(*id, EntityKind::Chatbot);
                        self.chatbots.push(Chatbot {
                            id: *id,
                            name: name.clone(),
                            created_at,
                        });
                        receipt.push(*id, true);
                    }
                }
                PendingEntity::Conversation {
                    id,
                    start_time,
                    user,
                    chatbot,
                    keying,
                } => {
                    let user_id = resolve_ref(*user, &receipt.ids)?;
                    let chatbot_id = resolve_ref(*chatbot, &receipt.ids)?;

                    let lookup_key = keying.lookup_key(&user_id, &chatbot_id, start_time);
                    if let Some(&row) = self.conversation_by_key.get(&lookup_key) {
                        receipt.push(self.conversations[row].id, false);
                    } else {
                        self.conversation_by_key
                            .insert(lookup_key.clone(), self.conversations.len());
                        self.kind_by_id.insert(*id, EntityKind::Conversation);
                        self.conversations.push(Conversation {
                            id: *id,
                            user_id,
                            chatbot_id,
                            start_time: start_time.clone(),
                            lookup_key,
                            created_at,
                        });
                        receipt.push(*id, true);
                    }
                }
                PendingEntity::Turn {
                    id,
                    conversation,
                    user_message,
                    chatbot_message,
                } => {
                    let conversation_id = resolve_ref(*conversation, &receipt.ids)?;

                    self.kind_by_id.insert(*id, EntityKind::Turn);
                    self.turns.push(Turn {
                        id: *id,
                        conversation_id,
                        user_message: user_message.clone(),
                        chatbot_message: chatbot_message.clone(),
                        created_at,
                    });
                    receipt.push(*id, true);
                }
            }
        }

        Ok(receipt)
    }
}

/// Entity store held entirely in process memory.
///
/// Used by tests and by `storage = "memory"`. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    tables: Mutex<Tables>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Persistence("entity store lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables()?;
        Ok(f(&tables))
    }

    fn commit_now(&self, batch: &PendingBatch) -> Result<CommitReceipt, StoreError> {
        let mut tables = self.tables()?;
        tables.validate(batch)?;
        tables.apply(batch)
    }
}

impl EntityStore for MemoryEntityStore {
    fn find_id(
        &self,
        kind: EntityKind,
        lookup_key: &str,
    ) -> impl Future<Output = Result<Option<Uuid>, StoreError>> + Send {
        let result = match kind {
            EntityKind::User => self.read(|t| t.user_by_name.get(lookup_key).map(|&i| t.users[i].id)),
            EntityKind::Chatbot => {
                self.read(|t| t.chatbot_by_name.get(lookup_key).map(|&i| t.chatbots[i].id))
            }
            EntityKind::Conversation => self.read(|t| {
                t.conversation_by_key
                    .get(lookup_key)
                    .map(|&i| t.conversations[i].id)
            }),
            EntityKind::Turn => Err(StoreError::Configuration(
                "turn has no identity key".to_string(),
            )),
        };
        ready(result)
    }

    fn commit(
        &self,
        batch: PendingBatch,
    ) -> impl Future<Output = Result<CommitReceipt, StoreError>> + Send {
        ready(self.commit_now(&batch))
    }

    fn get_user(&self, name: &str) -> impl Future<Output = Result<Option<User>, StoreError>> + Send {
        ready(self.read(|t| t.user_by_name.get(name).map(|&i| t.users[i].clone())))
    }

    fn get_chatbot(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Chatbot>, StoreError>> + Send {
        ready(self.read(|t| t.chatbot_by_name.get(name).map(|&i| t.chatbots[i].clone())))
    }

    fn get_conversation(
        &self,
        id: &Uuid,
    ) -> impl Future<Output = Result<Option<Conversation>, StoreError>> + Send {
        ready(self.read(|t| t.conversations.iter().find(|c| c.id == *id).cloned()))
    }

    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, StoreError>> + Send {
        ready(self.read(|t| t.users.clone()))
    }

    fn list_chatbots(&self) -> impl Future<Output = Result<Vec<Chatbot>, StoreError>> + Send {
        ready(self.read(|t| t.chatbots.clone()))
    }

    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, StoreError>> + Send {
        ready(self.read(|t| t.conversations.clone()))
    }

    fn list_turns(
        &self,
        conversation_id: &Uuid,
    ) -> impl Future<Output = Result<Vec<Turn>, StoreError>> + Send {
        ready(self.read(|t| {
            t.turns
                .iter()
                .filter(|turn| turn.conversation_id == *conversation_id)
                .cloned()
                .collect()
        }))
    }

    fn count(&self, kind: EntityKind) -> impl Future<Output = Result<u64, StoreError>> + Send {
        ready(self.read(|t| match kind {
            EntityKind::User => t.users.len() as u64,
            EntityKind::Chatbot => t.chatbots.len() as u64,
            EntityKind::Conversation => t.conversations.len() as u64,
            EntityKind::Turn => t.turns.len() as u64,
        }))
    }
}
