use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Endpoints and credentials for the remote moderation and generation
/// services. Read from `~/.config/indigochat/config.json` when present,
/// with environment-variable overrides taking precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3400/api".to_string(),
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Malformed config at {}", path.display()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("INDIGOCHAT_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(key) = std::env::var("INDIGOCHAT_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("INDIGOCHAT_MODEL") {
            self.model = model;
        }
    }

    pub fn moderation_url(&self) -> String {
        format!("{}/moderate", self.base_url.trim_end_matches('/'))
    }

    pub fn generation_url(&self) -> String {
        format!("{}/chat", self.base_url.trim_end_matches('/'))
    }
}

fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine config directory")?
        .join("indigochat")
        .join("config.json"))
}
