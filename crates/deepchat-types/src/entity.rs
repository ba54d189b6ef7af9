//! Persisted entity types for the conversation graph.
//!
//! User -> Conversation <- Chatbot, and Conversation -> Turn. Users and
//! Chatbots are keyed by display name, Conversations by their session start
//! marker (see [`ConversationKeying`]), and Turns have no identity key at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// The four entity kinds held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Chatbot,
    Conversation,
    Turn,
}

impl EntityKind {
    /// Whether this kind has an identity key and takes part in get-or-create.
    pub fn is_keyed(&self) -> bool {
        !matches!(self, EntityKind::Turn)
    }

    /// Name of the single field the identity key is read from.
    pub fn key_field(&self) -> Option<&'static str> {
        match self {
            EntityKind::User | EntityKind::Chatbot => Some("name"),
            EntityKind::Conversation => Some("start_time"),
            EntityKind::Turn => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Chatbot => write!(f, "chatbot"),
            EntityKind::Conversation => write!(f, "conversation"),
            EntityKind::Turn => write!(f, "turn"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = StoreError;

    /// Accepts singular or plural names, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "chatbot" | "chatbots" => Ok(EntityKind::Chatbot),
            "conversation" | "conversations" => Ok(EntityKind::Conversation),
            "turn" | "turns" => Ok(EntityKind::Turn),
            other => Err(StoreError::Configuration(format!(
                "unknown entity kind '{other}'"
            ))),
        }
    }
}

/// How a Conversation's identity key is built from its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKeying {
    /// Keyed by `(user, chatbot, marker)`. Two users who happen to share a
    /// marker value get separate conversations.
    #[default]
    Composite,
    /// Keyed by the marker alone. Identical markers from different users or
    /// chatbots collapse into one conversation.
    Marker,
}

impl ConversationKeying {
    /// Build the lookup key for a conversation under this policy.
    pub fn lookup_key(&self, user_id: &Uuid, chatbot_id: &Uuid, start_time: &str) -> String {
        match self {
            ConversationKeying::Composite => format!("{user_id}/{chatbot_id}/{start_time}"),
            ConversationKeying::Marker => start_time.to_string(),
        }
    }
}

impl fmt::Display for ConversationKeying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationKeying::Composite => write!(f, "composite"),
            ConversationKeying::Marker => write!(f, "marker"),
        }
    }
}

impl FromStr for ConversationKeying {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "composite" => Ok(ConversationKeying::Composite),
            "marker" => Ok(ConversationKeying::Marker),
            other => Err(format!("invalid conversation keying: '{other}'")),
        }
    }
}

/// A chat client, identified by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A bot persona, identified by display name (e.g. "Baby cornell").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chatbot {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One session's worth of exchanges between a user and a chatbot.
///
/// `start_time` is the session marker and never changes after creation.
/// `lookup_key` is the identity key under the keying policy in force when
/// the row was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chatbot_id: Uuid,
    pub start_time: String,
    pub lookup_key: String,
    pub created_at: DateTime<Utc>,
}

/// A single user message / bot response pair. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_message: String,
    pub chatbot_message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!("User".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert_eq!(
            "conversations".parse::<EntityKind>().unwrap(),
            EntityKind::Conversation
        );
        assert_eq!(EntityKind::Chatbot.to_string(), "chatbot");
    }

    #[test]
    fn test_entity_kind_unknown_is_configuration_error() {
        let err = "widget".parse::<EntityKind>().unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
        assert!(err.to_string().contains("widget"));
    }

    #[test]
    fn test_only_turn_is_unkeyed() {
        assert!(EntityKind::User.is_keyed());
        assert!(EntityKind::Conversation.is_keyed());
        assert!(!EntityKind::Turn.is_keyed());
        assert_eq!(EntityKind::Conversation.key_field(), Some("start_time"));
        assert_eq!(EntityKind::Turn.key_field(), None);
    }

    #[test]
    fn test_lookup_key_by_policy() {
        let user = Uuid::now_v7();
        let bot = Uuid::now_v7();
        let marker = "2024-01-01T00:00:00";

        assert_eq!(
            ConversationKeying::Marker.lookup_key(&user, &bot, marker),
            marker
        );
        let composite = ConversationKeying::Composite.lookup_key(&user, &bot, marker);
        assert!(composite.starts_with(&user.to_string()));
        assert!(composite.ends_with(marker));
    }

    #[test]
    fn test_keying_serde() {
        let json = serde_json::to_string(&ConversationKeying::Marker).unwrap();
        assert_eq!(json, "\"marker\"");
        assert_eq!(ConversationKeying::default(), ConversationKeying::Composite);
        assert!("bogus".parse::<ConversationKeying>().is_err());
    }
}
