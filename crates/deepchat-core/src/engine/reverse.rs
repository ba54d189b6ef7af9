//! The test-configuration engine.

use deepchat_types::error::EngineError;

use super::identity::TEST_BOT_NAME;
use super::inference::InferenceEngine;

/// Replies with the user's message reversed. Needs no model, so it is what
/// the registry serves in test configuration.
#[derive(Debug, Clone, Default)]
pub struct ReverseEngine;

impl ReverseEngine {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for ReverseEngine {
    fn name(&self) -> &str {
        TEST_BOT_NAME
    }

    async fn respond(&self, message: &str) -> Result<String, EngineError> {
        Ok(message.chars().rev().collect())
    }
}
