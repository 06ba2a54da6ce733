use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::indigo::models::Role;

/// System preamble sent ahead of every generation request
const SYSTEM_PREAMBLE: &str = "You are a helpful and friendly AI assistant named IndigoChat. \
     Provide a concise and conversational response to the user's prompt.";

/// One historical turn as the generation service sees it. Past attachments
/// are reduced to a presence marker; only the current turn's attachment is
/// ever forwarded in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
    pub attachment_present: bool,
}

/// The current turn's attachment, forwarded in full
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundAttachment {
    /// Self-describing data URI: `data:<mimeType>;base64,<payload>`
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Structured input for one generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub history: Vec<HistoryEntry>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<OutboundAttachment>,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(String),

    #[error("failed to parse generation response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GenerationError::Parse(e.to_string())
        } else {
            GenerationError::Http(e.to_string())
        }
    }
}

/// The opaque generation service: takes an assembled context, returns text
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationRequest<'a> {
    model: &'a str,
    system: &'a str,
    #[serde(flatten)]
    context: &'a GenerationContext,
}

#[derive(Deserialize)]
struct GenerationResponse {
    response: String,
}

/// Generation client backed by a remote completion endpoint
pub struct HttpGenerationClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpGenerationClient {
    pub fn new(endpoint: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError> {
        debug!(
            history_len = context.history.len(),
            has_attachment = context.attachment.is_some(),
            "Sending generation request"
        );

        let mut request = self.client.post(&self.endpoint).json(&GenerationRequest {
            model: &self.model,
            system: SYSTEM_PREAMBLE,
            context,
        });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: GenerationResponse = response.json().await?;

        debug!(response_len = body.response.len(), "Generation response received");

        Ok(body.response)
    }
}
