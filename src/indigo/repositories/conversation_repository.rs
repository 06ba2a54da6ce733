use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::error::RepositoryResult;
use crate::indigo::models::Message;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Serializable conversation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationData {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Records written before archiving existed lack this field
    #[serde(default)]
    pub archived: bool,
    pub created_at: i64, // Unix timestamp
    pub updated_at: i64, // Unix timestamp
}

/// The full conversation set, the sole unit of durable state.
///
/// The active-conversation pointer is deliberately not part of this record;
/// it is re-derived at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSetData {
    pub conversations: Vec<ConversationData>,
}

/// Repository trait for conversation-set persistence.
///
/// The whole set is written on every store mutation and read once at
/// startup, so the contract is a single load/save pair over the full
/// record rather than per-conversation operations.
pub trait ConversationSetRepository: Send + Sync + 'static {
    /// Load the persisted set. `Ok(None)` means no record exists yet.
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<ConversationSetData>>>;

    /// Durably write the full set, replacing any previous record
    fn save(&self, data: ConversationSetData) -> BoxFuture<'static, RepositoryResult<()>>;
}
