use std::path::PathBuf;

use super::conversation_repository::{
    BoxFuture, ConversationSetData, ConversationSetRepository,
};
use super::error::{RepositoryError, RepositoryResult};

/// JSON file-based repository for the conversation set.
/// Stores the whole set as a single file in ~/.config/indigochat/.
pub struct JsonSetRepository {
    path: PathBuf,
}

impl JsonSetRepository {
    pub fn new() -> RepositoryResult<Self> {
        let path = dirs::config_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Could not determine config directory".to_string(),
            })?
            .join("indigochat")
            .join("conversations.json");

        Ok(Self { path })
    }

    /// Repository backed by an explicit file path (used in tests)
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConversationSetRepository for JsonSetRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<ConversationSetData>>> {
        let path = self.path.clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                if !path.exists() {
                    return Ok(None);
                }

                let content = std::fs::read_to_string(&path)?;
                let data: ConversationSetData = serde_json::from_str(&content)?;
                Ok(Some(data))
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("Load task failed: {}", e),
            })?
        })
    }

    fn save(&self, data: ConversationSetData) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.path.clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                let json = serde_json::to_string_pretty(&data)?;

                // Write to temp, then rename, so an interrupted write never
                // leaves a half-written record behind
                let temp_path = path.with_extension("json.tmp");
                std::fs::write(&temp_path, json)?;
                std::fs::rename(&temp_path, &path)?;

                Ok(())
            })
            .await
            .map_err(|e| RepositoryError::InitializationError {
                message: format!("Save task failed: {}", e),
            })?
        })
    }
}
