//! Per-client session state threaded through each chat exchange.

use serde::{Deserialize, Serialize};

/// Session-scoped values owned by one client.
///
/// The outer layer (HTTP session map, CLI flags) supplies this for each
/// exchange and keeps whatever the core writes back into it. It is never
/// shared between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Display name the client chose. `None` falls back to the configured
    /// default user ("Anon").
    pub user: Option<String>,
    /// Data name of the bot this session last chatted with (e.g. "cornell").
    pub data_name: Option<String>,
    /// Conversation marker. Assigned on the first recorded exchange and
    /// reused for every later exchange in the same session.
    pub start_time: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    /// The session's display name, or `default` when the client never set one.
    pub fn user_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.user.as_deref().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_falls_back_to_default() {
        let session = SessionState::new();
        assert_eq!(session.user_or("Anon"), "Anon");

        let session = SessionState::new().with_user("Alice");
        assert_eq!(session.user_or("Anon"), "Alice");
    }

    #[test]
    fn test_new_session_has_no_marker() {
        let session = SessionState::new();
        assert!(session.start_time.is_none());
        assert!(session.data_name.is_none());
    }
}
