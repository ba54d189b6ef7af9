//! Read-only inspection of recorded entities.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use uuid::Uuid;

use deepchat_core::store::EntityStore;
use deepchat_types::entity::EntityKind;
use deepchat_types::error::StoreError;

use crate::state::AppState;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn print_footer(count: usize, noun: &str) {
    println!();
    println!(
        "  {} {noun}{}",
        style(count).bold(),
        if count == 1 { "" } else { "s" }
    );
    println!();
}

/// `deepchat list <kind>`.
pub async fn list_entities(state: &AppState, kind: &str, json: bool) -> Result<()> {
    let kind: EntityKind = kind.parse()?;
    let store = state.store();

    match kind {
        EntityKind::User => {
            let users = store.list_users().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }
            let mut table = new_table(&["Name", "Id", "Created"]);
            for user in &users {
                table.add_row(vec![
                    Cell::new(&user.name).fg(Color::Cyan),
                    Cell::new(user.id).fg(Color::DarkGrey),
                    Cell::new(user.created_at.format("%Y-%m-%d %H:%M:%S")),
                ]);
            }
            println!();
            println!("{table}");
            print_footer(users.len(), "user");
        }
        EntityKind::Chatbot => {
            let chatbots = store.list_chatbots().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chatbots)?);
                return Ok(());
            }
            let mut table = new_table(&["Name", "Id", "Created"]);
            for chatbot in &chatbots {
                table.add_row(vec![
                    Cell::new(&chatbot.name).fg(Color::Cyan),
                    Cell::new(chatbot.id).fg(Color::DarkGrey),
                    Cell::new(chatbot.created_at.format("%Y-%m-%d %H:%M:%S")),
                ]);
            }
            println!();
            println!("{table}");
            print_footer(chatbots.len(), "chatbot");
        }
        EntityKind::Conversation => {
            let conversations = store.list_conversations().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&conversations)?);
                return Ok(());
            }

            let users = store.list_users().await?;
            let chatbots = store.list_chatbots().await?;
            let name_of = |id: Uuid, names: &[(Uuid, String)]| {
                names
                    .iter()
                    .find(|(candidate, _)| *candidate == id)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| id.to_string())
            };
            let user_names: Vec<(Uuid, String)> =
                users.into_iter().map(|u| (u.id, u.name)).collect();
            let chatbot_names: Vec<(Uuid, String)> =
                chatbots.into_iter().map(|c| (c.id, c.name)).collect();

            let mut table = new_table(&["Id", "User", "Chatbot", "Started", "Turns"]);
            for conversation in &conversations {
                let turns = store.list_turns(&conversation.id).await?.len();
                table.add_row(vec![
                    Cell::new(conversation.id).fg(Color::DarkGrey),
                    Cell::new(name_of(conversation.user_id, &user_names)).fg(Color::Cyan),
                    Cell::new(name_of(conversation.chatbot_id, &chatbot_names)),
                    Cell::new(&conversation.start_time),
                    Cell::new(turns),
                ]);
            }
            println!();
            println!("{table}");
            print_footer(conversations.len(), "conversation");
        }
        EntityKind::Turn => {
            return Err(StoreError::Configuration(
                "turns are listed per conversation; use `deepchat show <conversation_id>`"
                    .to_string(),
            )
            .into());
        }
    }

    Ok(())
}

/// `deepchat show <conversation_id>`.
pub async fn show_conversation(state: &AppState, conversation_id: &str, json: bool) -> Result<()> {
    let id = Uuid::parse_str(conversation_id)
        .map_err(|e| anyhow::anyhow!("invalid conversation id '{conversation_id}': {e}"))?;
    let store = state.store();

    let conversation = store
        .get_conversation(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("conversation {id} not found"))?;
    let turns = store.list_turns(&id).await?;

    if json {
        let out = serde_json::json!({
            "conversation": conversation,
            "turns": turns,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Conversation").bold(),
        style(conversation.id).cyan()
    );
    println!("  {} {}", style("started").dim(), conversation.start_time);
    println!();

    let mut table = new_table(&["#", "User", "Bot", "At"]);
    for (i, turn) in turns.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(truncate(&turn.user_message, 60)),
            Cell::new(truncate(&turn.chatbot_message, 60)).fg(Color::Cyan),
            Cell::new(turn.created_at.format("%H:%M:%S")).fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");
    print_footer(turns.len(), "turn");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use deepchat_core::store::MemoryEntityStore;
    use deepchat_infra::store::AnyEntityStore;
    use deepchat_types::config::DeepChatConfig;
    use deepchat_types::session::SessionState;

    fn testing_state() -> AppState {
        let config = DeepChatConfig {
            testing: true,
            ..Default::default()
        };
        AppState::from_parts(
            config,
            &std::env::temp_dir(),
            AnyEntityStore::Memory(MemoryEntityStore::new()),
        )
    }

    #[tokio::test]
    async fn test_unknown_kind_is_configuration_error() {
        let state = testing_state();
        let err = list_entities(&state, "widgets", true).await.unwrap_err();
        let store_err = err.downcast_ref::<StoreError>().unwrap();
        assert!(matches!(store_err, StoreError::Configuration(_)));

        let err = list_entities(&state, "turns", true).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_show_after_exchange() {
        let state = testing_state();
        let mut session = SessionState::new();
        let outcome = state
            .chat_service
            .exchange(&mut session, "cornell", "hello")
            .await
            .unwrap();

        list_entities(&state, "users", true).await.unwrap();
        list_entities(&state, "Chatbots", false).await.unwrap();
        list_entities(&state, "conversation", false).await.unwrap();
        show_conversation(&state, &outcome.recorded.conversation_id.to_string(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_show_unknown_conversation_fails() {
        let state = testing_state();
        assert!(show_conversation(&state, "not-a-uuid", true).await.is_err());
        assert!(show_conversation(&state, &Uuid::now_v7().to_string(), true)
            .await
            .is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long message indeed", 10), "a very ...");
    }
}
