//! Application error type mapping to HTTP status codes.
//!
//! Every error body has the shape `{"error": {"code": ..., "message": ...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use deepchat_types::error::{ChatError, EngineError, StoreError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Failure from the chat service.
    Chat(ChatError),
    /// Malformed request.
    Validation(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Chat(ChatError::Store(e))
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Chat(ChatError::Engine(e))
    }
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Chat(ChatError::Store(StoreError::Configuration(_))) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::Chat(ChatError::Store(StoreError::Persistence(_))) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_ERROR")
            }
            AppError::Chat(ChatError::Engine(EngineError::Load { .. })) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ENGINE_LOAD_ERROR")
            }
            AppError::Chat(ChatError::Engine(EngineError::Inference { .. })) => {
                (StatusCode::BAD_GATEWAY, "ENGINE_INFERENCE_ERROR")
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Chat(e) => e.to_string(),
            AppError::Validation(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        } else {
            tracing::debug!(code, %message, "request rejected");
        }

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AppError::from(StoreError::Configuration("bad kind".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::from(StoreError::Persistence("disk full".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(EngineError::load("cornell", "missing")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(EngineError::inference("cornell", "crashed")),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::Validation("empty".into()), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_and_code().0, expected);
        }
    }
}
