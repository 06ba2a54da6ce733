use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Classification result for a candidate prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationVerdict {
    pub is_offensive: bool,
    pub reason: String,
}

/// Error type for moderation calls.
///
/// A failed call is a distinct signal from an offensive verdict: the
/// pipeline must never treat an unclassified prompt as safe.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("moderation request failed: {0}")]
    Http(String),

    #[error("failed to parse moderation response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ModerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ModerationError::Parse(e.to_string())
        } else {
            ModerationError::Http(e.to_string())
        }
    }
}

/// Classifies a candidate prompt before any generation call is made.
///
/// Callers must reject prompts that trim to empty before calling.
#[async_trait]
pub trait ModerationGate: Send + Sync {
    async fn check(&self, prompt: &str) -> Result<ModerationVerdict, ModerationError>;
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    prompt: &'a str,
}

/// Moderation gate backed by a remote classification endpoint
pub struct HttpModerationGate {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpModerationGate {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl ModerationGate for HttpModerationGate {
    async fn check(&self, prompt: &str) -> Result<ModerationVerdict, ModerationError> {
        debug!(prompt_len = prompt.len(), "Checking prompt against moderation endpoint");

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&ModerationRequest { prompt });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let verdict: ModerationVerdict = response.json().await?;

        debug!(
            is_offensive = verdict.is_offensive,
            "Moderation verdict received"
        );

        Ok(verdict)
    }
}
