//! Chat exchange payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a caller gets back for one chat message.
///
/// `bot_name` is the data name the engine was bound for (e.g. "cornell"),
/// not the chatbot's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub bot_name: String,
}

/// Row ids touched by one recorded exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedExchange {
    pub user_id: Uuid,
    pub chatbot_id: Uuid,
    pub conversation_id: Uuid,
    pub turn_id: Uuid,
    /// Marker the conversation is keyed by.
    pub start_time: String,
    /// True when this exchange created the conversation.
    pub new_conversation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_reply_json_shape() {
        let reply = ChatReply {
            response: "olleh".to_string(),
            bot_name: "cornell".to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["response"], "olleh");
        assert_eq!(json["bot_name"], "cornell");
    }
}
