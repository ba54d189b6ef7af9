//! One-shot chat command.

use anyhow::Result;
use console::style;
use serde_json::json;

use deepchat_types::session::SessionState;

use crate::state::AppState;

/// Run one exchange and print the reply with the marker to continue it.
pub async fn run_chat(
    state: &AppState,
    data_name: &str,
    message: &str,
    user: Option<String>,
    session_start: Option<String>,
    json: bool,
) -> Result<()> {
    let mut session = SessionState::new();
    session.user = user;
    session.start_time = session_start;

    let outcome = state
        .chat_service
        .exchange(&mut session, data_name, message)
        .await?;
    let marker = outcome.recorded.start_time.clone();

    if json {
        let out = json!({
            "response": outcome.reply.response,
            "bot_name": outcome.reply.bot_name,
            "session_start": marker,
            "conversation_id": outcome.recorded.conversation_id,
            "turn_id": outcome.recorded.turn_id,
            "new_conversation": outcome.recorded.new_conversation,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(format!("{}:", outcome.reply.bot_name)).cyan().bold(),
        outcome.reply.response
    );
    println!();
    let status = if outcome.recorded.new_conversation {
        "new conversation"
    } else {
        "continued"
    };
    println!(
        "  {} {} ({status})",
        style("conversation").dim(),
        style(outcome.recorded.conversation_id).dim()
    );
    println!(
        "  {} {}",
        style("continue with").dim(),
        style(format!("--session-start {marker}")).yellow()
    );
    println!();

    Ok(())
}
