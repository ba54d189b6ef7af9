//! Chat service: bind, respond, record.

use tracing::{info, instrument};

use deepchat_types::chat::{ChatReply, RecordedExchange};
use deepchat_types::error::ChatError;
use deepchat_types::session::SessionState;

use crate::conversation::ConversationResolver;
use crate::engine::identity::chatbot_name;
use crate::engine::{BotBindingRegistry, EngineLoader};
use crate::store::EntityStore;

/// Reply plus the rows the exchange touched.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub reply: ChatReply,
    pub recorded: RecordedExchange,
}

/// Runs one chat exchange end to end.
///
/// Generic over the entity store and the engine loader so core never depends
/// on infra.
pub struct ChatService<S: EntityStore, L: EngineLoader> {
    resolver: ConversationResolver<S>,
    registry: BotBindingRegistry<L>,
}

impl<S: EntityStore, L: EngineLoader> ChatService<S, L> {
    pub fn new(resolver: ConversationResolver<S>, registry: BotBindingRegistry<L>) -> Self {
        Self { resolver, registry }
    }

    pub fn resolver(&self) -> &ConversationResolver<S> {
        &self.resolver
    }

    pub fn registry(&self) -> &BotBindingRegistry<L> {
        &self.registry
    }

    /// Send `user_message` to the bot named `data_name` and record the exchange.
    ///
    /// The engine is bound and queried under the registry lock; the lock is
    /// released before the exchange is written. Nothing is recorded unless a
    /// response was produced, and nothing is returned unless the exchange was
    /// recorded. `session` is updated only on success.
    #[instrument(skip_all, fields(data_name = %data_name))]
    pub async fn exchange(
        &self,
        session: &mut SessionState,
        data_name: &str,
        user_message: &str,
    ) -> Result<ExchangeOutcome, ChatError> {
        let response = {
            let bound = self.registry.bind(data_name).await?;
            bound.respond(user_message).await?
        };

        let chatbot = chatbot_name(self.registry.is_testing(), Some(data_name));
        let recorded = self
            .resolver
            .record(session, &chatbot, user_message, &response)
            .await?;
        session.data_name = Some(data_name.to_string());

        info!(
            chatbot = %chatbot,
            conversation_id = %recorded.conversation_id,
            turn_id = %recorded.turn_id,
            "Exchange recorded"
        );

        Ok(ExchangeOutcome {
            reply: ChatReply {
                response,
                bot_name: data_name.to_string(),
            },
            recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use deepchat_types::entity::{ConversationKeying, EntityKind};
    use deepchat_types::error::EngineError;

    use crate::engine::{BoxEngine, InferenceEngine};
    use crate::store::MemoryEntityStore;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct EchoEngine {
        identity: String,
    }

    impl InferenceEngine for EchoEngine {
        fn name(&self) -> &str {
            &self.identity
        }

        async fn respond(&self, message: &str) -> Result<String, EngineError> {
            if message == "explode" {
                return Err(EngineError::inference(&self.identity, "model crashed"));
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(format!("[{}] {message}", self.identity))
        }
    }

    struct EchoLoader;

    impl EngineLoader for EchoLoader {
        async fn load(&self, identity: &str) -> Result<BoxEngine, EngineError> {
            if identity == "missing" {
                return Err(EngineError::load(identity, "no such model"));
            }
            Ok(BoxEngine::new(EchoEngine {
                identity: identity.to_string(),
            }))
        }
    }

    fn service(testing: bool) -> ChatService<MemoryEntityStore, EchoLoader> {
        let resolver = ConversationResolver::new(
            MemoryEntityStore::new(),
            ConversationKeying::Composite,
            TIMEOUT,
            "Anon",
        );
        let registry = if testing {
            BotBindingRegistry::testing(EchoLoader)
        } else {
            BotBindingRegistry::new(EchoLoader, TIMEOUT)
        };
        ChatService::new(resolver, registry)
    }

    #[tokio::test]
    async fn test_exchange_replies_and_records() {
        let service = service(false);
        let mut session = SessionState::new().with_user("Alice");

        let outcome = service.exchange(&mut session, "Fido", "hi").await.unwrap();
        assert_eq!(outcome.reply.response, "[Fido] hi");
        assert_eq!(outcome.reply.bot_name, "Fido");
        assert_eq!(session.data_name.as_deref(), Some("Fido"));
        assert!(session.start_time.is_some());

        let store = service.resolver().store();
        let bot = store.get_chatbot("Baby Fido").await.unwrap().unwrap();
        assert_eq!(bot.id, outcome.recorded.chatbot_id);
    }

    #[tokio::test]
    async fn test_testing_mode_uses_reverse_bot() {
        let service = service(true);
        let mut session = SessionState::new();

        let outcome = service.exchange(&mut session, "cornell", "abc").await.unwrap();
        assert_eq!(outcome.reply.response, "cba");
        assert_eq!(outcome.reply.bot_name, "cornell");

        let store = service.resolver().store();
        assert!(store.get_chatbot("Reverse TestBot").await.unwrap().is_some());
        assert!(store.get_user("Anon").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_engine_failures_record_nothing() {
        let service = service(false);
        let mut session = SessionState::new();

        let err = service.exchange(&mut session, "missing", "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Engine(EngineError::Load { .. })));

        let err = service.exchange(&mut session, "cornell", "explode").await.unwrap_err();
        assert!(matches!(err, ChatError::Engine(EngineError::Inference { .. })));

        assert!(session.start_time.is_none());
        assert!(session.data_name.is_none());
        let store = service.resolver().store();
        assert_eq!(store.count(EntityKind::Turn).await.unwrap(), 0);
        assert_eq!(store.count(EntityKind::User).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_record_against_right_chatbot() {
        let service = Arc::new(service(false));
        let mut handles = Vec::new();

        for i in 0..30 {
            let service = Arc::clone(&service);
            let data_name = if i % 2 == 0 { "cornell" } else { "reddit" };
            handles.push(tokio::spawn(async move {
                let mut session = SessionState::new().with_user(format!("user-{i}"));
                let outcome = service
                    .exchange(&mut session, data_name, &format!("m{i}"))
                    .await
                    .unwrap();
                (data_name, i, outcome)
            }));
        }

        let store = service.resolver().store();
        for handle in handles {
            let (data_name, i, outcome) = handle.await.unwrap();
            assert_eq!(outcome.reply.response, format!("[{data_name}] m{i}"));

            let expected = store
                .get_chatbot(&format!("Baby {data_name}"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(outcome.recorded.chatbot_id, expected.id);

            let turns = store.list_turns(&outcome.recorded.conversation_id).await.unwrap();
            assert_eq!(turns.len(), 1);
            assert_eq!(turns[0].chatbot_message, format!("[{data_name}] m{i}"));
        }
        assert_eq!(store.count(EntityKind::Chatbot).await.unwrap(), 2);
    }
}
