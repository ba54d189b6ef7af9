//! Chat endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Display name for the session's user.
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub bot_name: String,
    pub session_id: String,
}

/// POST /chat/{data_name}/ - Send one message to the named bot.
pub async fn chat(
    State(state): State<AppState>,
    Path(data_name): Path<String>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    if body.user_message.trim().is_empty() {
        return Err(AppError::Validation("user_message must not be empty".to_string()));
    }

    let (session_id, session) = state.sessions.get_or_create(body.session_id.as_deref())?;
    let mut session = session.lock().await;
    if let Some(user) = body.user.filter(|u| !u.trim().is_empty()) {
        session.user = Some(user);
    }

    let outcome = state
        .chat_service
        .exchange(&mut session, &data_name, &body.user_message)
        .await?;

    Ok(Json(ChatResponse {
        response: outcome.reply.response,
        bot_name: outcome.reply.bot_name,
        session_id,
    }))
}
