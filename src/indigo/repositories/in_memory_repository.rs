use std::sync::{Arc, Mutex};

use super::conversation_repository::{
    BoxFuture, ConversationSetData, ConversationSetRepository,
};
use super::error::{RepositoryError, RepositoryResult};

/// In-memory repository for the conversation set.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemorySetRepository {
    record: Arc<Mutex<Option<ConversationSetData>>>,
}

impl InMemorySetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently saved record, for asserting write-per-mutation
    /// behavior in tests
    pub fn saved_record(&self) -> Option<ConversationSetData> {
        self.record.lock().ok().and_then(|r| r.clone())
    }
}

impl ConversationSetRepository for InMemorySetRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<ConversationSetData>>> {
        let record = self.record.clone();

        Box::pin(async move {
            let guard = record.lock().map_err(|e| RepositoryError::InitializationError {
                message: format!("Failed to lock record: {}", e),
            })?;
            Ok(guard.clone())
        })
    }

    fn save(&self, data: ConversationSetData) -> BoxFuture<'static, RepositoryResult<()>> {
        let record = self.record.clone();

        Box::pin(async move {
            let mut guard = record.lock().map_err(|e| RepositoryError::InitializationError {
                message: format!("Failed to lock record: {}", e),
            })?;
            *guard = Some(data);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indigo::repositories::ConversationData;

    #[tokio::test]
    async fn test_load_starts_empty() {
        let repo = InMemorySetRepository::new();
        assert!(repo.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let repo = InMemorySetRepository::new();

        let data = ConversationSetData {
            conversations: vec![ConversationData {
                id: "test-1".to_string(),
                title: "Test Conversation".to_string(),
                messages: Vec::new(),
                archived: false,
                created_at: 1000,
                updated_at: 1000,
            }],
        };

        repo.save(data).await.unwrap();

        let loaded = repo.load().await.unwrap().unwrap();
        assert_eq!(loaded.conversations.len(), 1);
        assert_eq!(loaded.conversations[0].id, "test-1");
    }
}
