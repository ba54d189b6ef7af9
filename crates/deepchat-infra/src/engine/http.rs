//! HTTP inference engine for a frozen model served out of process.
//!
//! POSTs `{"message": ...}` to the model's endpoint and reads
//! `{"response": ...}` back.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use deepchat_core::engine::InferenceEngine;
use deepchat_types::error::EngineError;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    response: String,
}

/// Engine that forwards each message to a model server.
pub struct HttpEngine {
    identity: String,
    client: reqwest::Client,
    endpoint: reqwest::Url,
    timeout: Duration,
}

impl HttpEngine {
    pub fn new(
        identity: impl Into<String>,
        client: reqwest::Client,
        endpoint: reqwest::Url,
        timeout: Duration,
    ) -> Self {
        Self {
            identity: identity.into(),
            client,
            endpoint,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl InferenceEngine for HttpEngine {
    fn name(&self) -> &str {
        &self.identity
    }

    async fn respond(&self, message: &str) -> Result<String, EngineError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&InferenceRequest { message })
            .send()
            .await
            .map_err(|e| EngineError::inference(&self.identity, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EngineError::inference(
                &self.identity,
                format!("HTTP {status}: {error_body}"),
            ));
        }

        let body: InferenceResponse = response.json().await.map_err(|e| {
            EngineError::inference(&self.identity, format!("failed to parse response: {e}"))
        })?;

        Ok(body.response)
    }

    async fn release(&self) -> Result<(), EngineError> {
        debug!(identity = %self.identity, endpoint = %self.endpoint, "released http engine");
        Ok(())
    }
}
