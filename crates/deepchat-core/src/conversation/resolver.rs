//! ConversationResolver: one exchange in, one committed graph mutation out.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{info, instrument};

use deepchat_types::chat::RecordedExchange;
use deepchat_types::entity::{ConversationKeying, EntityKind};
use deepchat_types::error::StoreError;
use deepchat_types::session::SessionState;

use crate::store::repository::EntityStore;
use crate::store::unit_of_work::{Attributes, UnitOfWork};
use crate::store::{CommitReceipt, EntityRef};

/// A fresh session marker: the current UTC time, RFC 3339 with microseconds.
pub fn new_session_marker() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Records chat exchanges against an [`EntityStore`].
///
/// Generic over the store so the same logic runs against the in-memory and
/// SQLite backends.
pub struct ConversationResolver<S: EntityStore> {
    store: S,
    keying: ConversationKeying,
    commit_timeout: Duration,
    default_user: String,
}

impl<S: EntityStore> ConversationResolver<S> {
    pub fn new(
        store: S,
        keying: ConversationKeying,
        commit_timeout: Duration,
        default_user: impl Into<String>,
    ) -> Self {
        Self {
            store,
            keying,
            commit_timeout,
            default_user: default_user.into(),
        }
    }

    /// Access the underlying store (read-side queries).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keying(&self) -> ConversationKeying {
        self.keying
    }

    /// Record one exchange.
    ///
    /// Resolves the session's user, the chatbot, and the conversation for the
    /// session marker, appends a turn, and commits once. If the session had no
    /// marker yet, a new one is derived and written back into `session` only
    /// after the commit succeeds, so a failed exchange never leaves the session
    /// pointing at a conversation that was not stored.
    ///
    /// An existing conversation keeps its original user/chatbot links even if
    /// this exchange names different ones.
    #[instrument(skip_all, fields(chatbot = %chatbot_name))]
    pub async fn record(
        &self,
        session: &mut SessionState,
        chatbot_name: &str,
        user_message: &str,
        bot_response: &str,
    ) -> Result<RecordedExchange, StoreError> {
        let user_name = session.user_or(&self.default_user).to_string();
        let start_time = session
            .start_time
            .clone()
            .unwrap_or_else(new_session_marker);

        let mut uow = UnitOfWork::new(&self.store, self.keying, self.commit_timeout);

        let user = uow.resolve(EntityKind::User, &user_name, Attributes::None).await?;
        let chatbot = uow
            .resolve(EntityKind::Chatbot, chatbot_name, Attributes::None)
            .await?;
        let conversation = uow
            .resolve(
                EntityKind::Conversation,
                &start_time,
                Attributes::Conversation { user, chatbot },
            )
            .await?;
        let turn = uow.resolve_unconditional(
            EntityKind::Turn,
            Attributes::Turn {
                conversation,
                user_message: user_message.to_string(),
                chatbot_message: bot_response.to_string(),
            },
        )?;

        let receipt = uow.commit().await?;

        let recorded = RecordedExchange {
            user_id: committed_id(&receipt, user)?,
            chatbot_id: committed_id(&receipt, chatbot)?,
            conversation_id: committed_id(&receipt, conversation)?,
            turn_id: committed_id(&receipt, turn)?,
            new_conversation: receipt.was_inserted(conversation),
            start_time,
        };

        if session.start_time.is_none() {
            session.start_time = Some(recorded.start_time.clone());
        }

        if recorded.new_conversation {
            info!(
                user = %user_name,
                conversation_id = %recorded.conversation_id,
                start_time = %recorded.start_time,
                "Conversation started"
            );
        }

        Ok(recorded)
    }
}

fn committed_id(receipt: &CommitReceipt, entity_ref: EntityRef) -> Result<uuid::Uuid, StoreError> {
    receipt.id_of(entity_ref).ok_or_else(|| {
        StoreError::Persistence(format!("commit receipt is missing {entity_ref}"))
    })
}
