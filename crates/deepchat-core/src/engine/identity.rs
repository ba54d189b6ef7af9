//! Bot identity derivation shared by the registry and the resolver.

/// Chatbot name used in test configuration, regardless of the requested bot.
pub const TEST_BOT_NAME: &str = "Reverse TestBot";

/// Placeholder data name when the client never picked a bot.
pub const UNKNOWN_BOT: &str = "Unknown Bot";

/// Display name of the chatbot entity that records exchanges for `data_name`.
///
/// "Baby cornell" for data name "cornell", "Baby Unknown Bot" when no name was
/// supplied, and the fixed test bot name in test configuration.
pub fn chatbot_name(testing: bool, data_name: Option<&str>) -> String {
    if testing {
        return TEST_BOT_NAME.to_string();
    }
    format!("Baby {}", data_name.unwrap_or(UNKNOWN_BOT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chatbot_name() {
        assert_eq!(chatbot_name(false, Some("Fido")), "Baby Fido");
        assert_eq!(chatbot_name(false, None), "Baby Unknown Bot");
        assert_eq!(chatbot_name(true, Some("cornell")), "Reverse TestBot");
    }
}
