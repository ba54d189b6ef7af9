//! SQLite entity store implementation.
//!
//! Implements `EntityStore` from `deepchat-core` using sqlx with split
//! read/write pools. Commits run in one writer transaction; keyed rows use
//! `INSERT ... ON CONFLICT DO NOTHING` followed by a keyed `SELECT`, so
//! concurrent commits staging the same key converge on a single row.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use deepchat_core::store::{resolve_ref, CommitReceipt, EntityStore, PendingBatch, PendingEntity};
use deepchat_types::entity::{Chatbot, Conversation, EntityKind, Turn, User};
use deepchat_types::error::StoreError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `EntityStore`.
#[derive(Clone)]
pub struct SqliteEntityStore {
    pool: DatabasePool,
}

impl SqliteEntityStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Row of `users` or `chatbots`; both tables share one shape.
struct NamedRow {
    id: String,
    name: String,
    created_at: String,
}

impl NamedRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_user(self) -> Result<User, StoreError> {
        Ok(User {
            id: parse_id(&self.id, "user id")?,
            name: self.name,
            created_at: parse_datetime(&self.created_at)?,
        })
    }

    fn into_chatbot(self) -> Result<Chatbot, StoreError> {
        Ok(Chatbot {
            id: parse_id(&self.id, "chatbot id")?,
            name: self.name,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct ConversationRow {
    id: String,
    user_id: String,
    chatbot_id: String,
    start_time: String,
    lookup_key: String,
    created_at: String,
}

impl ConversationRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            chatbot_id: row.try_get("chatbot_id")?,
            start_time: row.try_get("start_time")?,
            lookup_key: row.try_get("lookup_key")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, StoreError> {
        Ok(Conversation {
            id: parse_id(&self.id, "conversation id")?,
            user_id: parse_id(&self.user_id, "user_id")?,
            chatbot_id: parse_id(&self.chatbot_id, "chatbot_id")?,
            start_time: self.start_time,
            lookup_key: self.lookup_key,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct TurnRow {
    id: String,
    conversation_id: String,
    user_message: String,
    chatbot_message: String,
    created_at: String,
}

impl TurnRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            user_message: row.try_get("user_message")?,
            chatbot_message: row.try_get("chatbot_message")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_turn(self) -> Result<Turn, StoreError> {
        Ok(Turn {
            id: parse_id(&self.id, "turn id")?,
            conversation_id: parse_id(&self.conversation_id, "conversation_id")?,
            user_message: self.user_message,
            chatbot_message: self.chatbot_message,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn persistence(e: sqlx::Error) -> StoreError {
    StoreError::Persistence(e.to_string())
}

fn parse_id(s: &str, what: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Persistence(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Persistence(format!("invalid datetime: {e}")))
}

/// Fixed-width timestamps so `ORDER BY created_at` matches insertion order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn table_of(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "users",
        EntityKind::Chatbot => "chatbots",
        EntityKind::Conversation => "conversations",
        EntityKind::Turn => "turns",
    }
}

/// Insert a user or chatbot unless its name exists; return the row id either way.
async fn insert_named(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: &Uuid,
    name: &str,
    created_at: &str,
) -> Result<(Uuid, bool), StoreError> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO {table} (id, name, created_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING"
    ))
    .bind(id.to_string())
    .bind(name)
    .bind(created_at)
    .execute(&mut *conn)
    .await
    .map_err(persistence)?
    .rows_affected()
        == 1;

    let row = sqlx::query(&format!("SELECT id FROM {table} WHERE name = ?"))
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(persistence)?;
    let row_id: String = row.try_get("id").map_err(persistence)?;

    Ok((parse_id(&row_id, "row id")?, inserted))
}

async fn apply(
    conn: &mut SqliteConnection,
    batch: &PendingBatch,
) -> Result<CommitReceipt, StoreError> {
    let mut receipt = CommitReceipt::default();

    for entity in batch.entities() {
        let created_at = format_datetime(&Utc::now());
        match entity {
            PendingEntity::User { id, name } => {
                let (row_id, inserted) = insert_named(conn, "users", id, name, &created_at).await?;
                receipt.push(row_id, inserted);
            }
            PendingEntity::Chatbot { id, name } => {
                let (row_id, inserted) =
                    insert_named(conn, "chatbots", id, name, &created_at).await?;
                receipt.push(row_id, inserted);
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

                let inserted = sqlx::query(
                    r#"INSERT INTO conversations (id, user_id, chatbot_id, start_time, lookup_key, created_at)
                       VALUES (?, ?, ?, ?, ?, ?)
                       ON CONFLICT(lookup_key) DO NOTHING"#,
                )
                .bind(id.to_string())
                .bind(user_id.to_string())
                .bind(chatbot_id.to_string())
                .bind(start_time)
                .bind(&lookup_key)
                .bind(&created_at)
                .execute(&mut *conn)
                .await
                .map_err(persistence)?
                .rows_affected()
                    == 1;

                let row = sqlx::query("SELECT id FROM conversations WHERE lookup_key = ?")
                    .bind(&lookup_key)
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(persistence)?;
                let row_id: String = row.try_get("id").map_err(persistence)?;
                receipt.push(parse_id(&row_id, "conversation id")?, inserted);
            }
            PendingEntity::Turn {
                id,
                conversation,
                user_message,
                chatbot_message,
            } => {
                let conversation_id = resolve_ref(*conversation, &receipt.ids)?;

                sqlx::query(
                    r#"INSERT INTO turns (id, conversation_id, user_message, chatbot_message, created_at)
                       VALUES (?, ?, ?, ?, ?)"#,
                )
                .bind(id.to_string())
                .bind(conversation_id.to_string())
                .bind(user_message)
                .bind(chatbot_message)
                .bind(&created_at)
                .execute(&mut *conn)
                .await
                .map_err(persistence)?;
                receipt.push(*id, true);
            }
        }
    }

    Ok(receipt)
}

// ---------------------------------------------------------------------------
// EntityStore implementation
// ---------------------------------------------------------------------------

impl EntityStore for SqliteEntityStore {
    async fn find_id(&self, kind: EntityKind, lookup_key: &str) -> Result<Option<Uuid>, StoreError> {
        let sql = match kind {
            EntityKind::User => "SELECT id FROM users WHERE name = ?",
            EntityKind::Chatbot => "SELECT id FROM chatbots WHERE name = ?",
            EntityKind::Conversation => "SELECT id FROM conversations WHERE lookup_key = ?",
            EntityKind::Turn => {
                return Err(StoreError::Configuration(
                    "turn has no identity key".to_string(),
                ));
            }
        };

        let row = sqlx::query(sql)
            .bind(lookup_key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(persistence)?;

        match row {
            Some(row) => {
                let id: String = row.try_get("id").map_err(persistence)?;
                Ok(Some(parse_id(&id, "row id")?))
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, batch: PendingBatch) -> Result<CommitReceipt, StoreError> {
        let mut tx = self.pool.writer.begin().await.map_err(persistence)?;

        // Dropping `tx` on error rolls the whole batch back.
        let receipt = apply(&mut *tx, &batch).await?;

        tx.commit().await.map_err(persistence)?;

        debug!(
            entities = batch.len(),
            inserted = receipt.inserted_count(),
            "sqlite commit applied"
        );
        Ok(receipt)
    }

    async fn get_user(&self, name: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(persistence)?;

        match row {
            Some(row) => Ok(Some(NamedRow::from_row(&row).map_err(persistence)?.into_user()?)),
            None => Ok(None),
        }
    }

    async fn get_chatbot(&self, name: &str) -> Result<Option<Chatbot>, StoreError> {
        let row = sqlx::query("SELECT * FROM chatbots WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(persistence)?;

        match row {
            Some(row) => Ok(Some(
                NamedRow::from_row(&row).map_err(persistence)?.into_chatbot()?,
            )),
            None => Ok(None),
        }
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(persistence)?;

        match row {
            Some(row) => Ok(Some(
                ConversationRow::from_row(&row)
                    .map_err(persistence)?
                    .into_conversation()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(persistence)?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(NamedRow::from_row(row).map_err(persistence)?.into_user()?);
        }
        Ok(users)
    }

    async fn list_chatbots(&self) -> Result<Vec<Chatbot>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chatbots ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(persistence)?;

        let mut chatbots = Vec::with_capacity(rows.len());
        for row in &rows {
            chatbots.push(NamedRow::from_row(row).map_err(persistence)?.into_chatbot()?);
        }
        Ok(chatbots)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(persistence)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            conversations.push(
                ConversationRow::from_row(row)
                    .map_err(persistence)?
                    .into_conversation()?,
            );
        }
        Ok(conversations)
    }

    async fn list_turns(&self, conversation_id: &Uuid) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM turns WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(persistence)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            turns.push(TurnRow::from_row(row).map_err(persistence)?.into_turn()?);
        }
        Ok(turns)
    }

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {}", table_of(kind)))
            .fetch_one(&self.pool.reader)
            .await
            .map_err(persistence)?;

        let count: i64 = row.try_get("cnt").map_err(persistence)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use deepchat_core::conversation::ConversationResolver;
    use deepchat_core::store::EntityRef;
    use deepchat_types::entity::ConversationKeying;
    use deepchat_types::session::SessionState;

    async fn test_store() -> (SqliteEntityStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("entities.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteEntityStore::new(pool), dir)
    }

    fn graph(user: &str, chatbot: &str, marker: &str, message: &str) -> PendingBatch {
        PendingBatch::new(vec![
            PendingEntity::User {
                id: Uuid::now_v7(),
                name: user.to_string(),
            },
            PendingEntity::Chatbot {
                id: Uuid::now_v7(),
                name: chatbot.to_string(),
            },
            PendingEntity::Conversation {
                id: Uuid::now_v7(),
                start_time: marker.to_string(),
                user: EntityRef::Pending(0),
                chatbot: EntityRef::Pending(1),
                keying: ConversationKeying::Composite,
            },
            PendingEntity::Turn {
                id: Uuid::now_v7(),
                conversation: EntityRef::Pending(2),
                user_message: message.to_string(),
                chatbot_message: format!("re: {message}"),
            },
        ])
    }

    #[tokio::test]
    async fn test_commit_inserts_graph() {
        let (store, _dir) = test_store().await;

        let receipt = store.commit(graph("Alice", "Baby Fido", "T1", "hi")).await.unwrap();
        assert_eq!(receipt.inserted_count(), 4);

        let alice = store.get_user("Alice").await.unwrap().unwrap();
        let fido = store.get_chatbot("Baby Fido").await.unwrap().unwrap();
        assert_eq!(alice.id, receipt.ids[0]);
        assert_eq!(fido.id, receipt.ids[1]);

        let conv = store.get_conversation(&receipt.ids[2]).await.unwrap().unwrap();
        assert_eq!(conv.user_id, alice.id);
        assert_eq!(conv.chatbot_id, fido.id);
        assert_eq!(conv.start_time, "T1");
        assert_eq!(conv.lookup_key, format!("{}/{}/T1", alice.id, fido.id));

        let turns = store.list_turns(&conv.id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_message, "hi");
        assert_eq!(turns[0].chatbot_message, "re: hi");
    }

    #[tokio::test]
    async fn test_repeat_commit_converges_and_appends_turn() {
        let (store, _dir) = test_store().await;

        let first = store.commit(graph("Alice", "Baby Fido", "T1", "one")).await.unwrap();
        let second = store.commit(graph("Alice", "Baby Fido", "T1", "two")).await.unwrap();

        assert_eq!(&first.ids[..3], &second.ids[..3]);
        assert_eq!(second.inserted, vec![false, false, false, true]);

        assert_eq!(store.count(EntityKind::User).await.unwrap(), 1);
        assert_eq!(store.count(EntityKind::Chatbot).await.unwrap(), 1);
        assert_eq!(store.count(EntityKind::Conversation).await.unwrap(), 1);
        assert_eq!(store.count(EntityKind::Turn).await.unwrap(), 2);

        let turns = store.list_turns(&first.ids[2]).await.unwrap();
        let messages: Vec<&str> = turns.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let (store, _dir) = test_store().await;

        let batch = PendingBatch::new(vec![
            PendingEntity::User {
                id: Uuid::now_v7(),
                name: "Alice".to_string(),
            },
            PendingEntity::Turn {
                id: Uuid::now_v7(),
                conversation: EntityRef::Persisted(Uuid::now_v7()),
                user_message: "hi".to_string(),
                chatbot_message: "hello".to_string(),
            },
        ]);

        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.get_user("Alice").await.unwrap().is_none());
        assert_eq!(store.count(EntityKind::Turn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_id_by_key() {
        let (store, _dir) = test_store().await;
        let receipt = store.commit(graph("Anon", "Baby X", "T1", "hi")).await.unwrap();

        assert_eq!(
            store.find_id(EntityKind::User, "Anon").await.unwrap(),
            Some(receipt.ids[0])
        );
        assert_eq!(store.find_id(EntityKind::Chatbot, "Baby Y").await.unwrap(), None);

        let key = format!("{}/{}/T1", receipt.ids[0], receipt.ids[1]);
        assert_eq!(
            store.find_id(EntityKind::Conversation, &key).await.unwrap(),
            Some(receipt.ids[2])
        );

        let err = store.find_id(EntityKind::Turn, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_resolver_concurrent_exchanges_on_one_marker() {
        let (store, _dir) = test_store().await;
        let resolver = Arc::new(ConversationResolver::new(
            store,
            ConversationKeying::Composite,
            Duration::from_secs(10),
            "Anon",
        ));

        let mut first = SessionState::new().with_user("Alice");
        resolver
            .record(&mut first, "Baby Fido", "start", "ok")
            .await
            .unwrap();
        let marker = first.start_time.clone().unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let resolver = Arc::clone(&resolver);
            let marker = marker.clone();
            handles.push(tokio::spawn(async move {
                let mut session = SessionState::new()
                    .with_user("Alice")
                    .with_start_time(marker);
                resolver
                    .record(&mut session, "Baby Fido", &format!("m{i}"), "ok")
                    .await
                    .unwrap()
            }));
        }

        let mut conversations = Vec::new();
        for handle in handles {
            let recorded = handle.await.unwrap();
            assert!(!recorded.new_conversation);
            conversations.push(recorded.conversation_id);
        }
        conversations.dedup();
        assert_eq!(conversations.len(), 1);

        let store = resolver.store();
        assert_eq!(store.count(EntityKind::Conversation).await.unwrap(), 1);
        assert_eq!(store.count(EntityKind::Turn).await.unwrap(), 11);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
        assert_eq!(store.list_chatbots().await.unwrap().len(), 1);
        assert_eq!(store.list_conversations().await.unwrap().len(), 1);
    }
}
