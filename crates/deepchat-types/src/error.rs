use thiserror::Error;

/// Errors raised by the entity store and the unit of work staged against it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller bug: unknown entity kind, or attributes that do not fit the kind.
    /// Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backing storage failed or timed out. After a failure nothing from
    /// the commit is visible. After a timeout the outcome is unknown: the
    /// store may have completed the commit after the caller stopped waiting.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl StoreError {
    /// Whether the client may resubmit the exchange.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Persistence(_))
    }
}

/// Errors raised while loading or invoking an inference engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load engine '{identity}': {message}")]
    Load { identity: String, message: String },

    #[error("engine '{identity}' failed to respond: {message}")]
    Inference { identity: String, message: String },
}

impl EngineError {
    pub fn load(identity: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Load {
            identity: identity.into(),
            message: message.into(),
        }
    }

    pub fn inference(identity: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Inference {
            identity: identity.into(),
            message: message.into(),
        }
    }

    /// Both variants are transient from the client's point of view.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Umbrella error for one chat exchange (bind, respond, record).
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Store(e) => e.is_retryable(),
            ChatError::Engine(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Configuration("unknown entity kind 'widget'".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: unknown entity kind 'widget'"
        );
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::load("cornell", "descriptor not found");
        assert_eq!(
            err.to_string(),
            "failed to load engine 'cornell': descriptor not found"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(!StoreError::Configuration("x".into()).is_retryable());
        assert!(StoreError::Persistence("disk full".into()).is_retryable());

        let chat: ChatError = EngineError::inference("reddit", "timeout").into();
        assert!(chat.is_retryable());

        let chat: ChatError = StoreError::Configuration("x".into()).into();
        assert!(!chat.is_retryable());
    }
}
