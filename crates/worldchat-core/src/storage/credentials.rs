//! Provider credential storage
//!
//! API keys live only on the server, in a JSON file keyed by provider.
//! Environment variables take over when the file has no entry.

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::providers::ProviderId;
use crate::paths;

/// Storage for API keys indexed by provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialStore {
    #[serde(flatten)]
    keys: HashMap<String, String>,
}

impl CredentialStore {
    /// Default credentials file (~/.worldchat/tokens/credentials.json)
    pub fn default_path() -> PathBuf {
        paths::tokens_dir().join("credentials.json")
    }

    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let store: CredentialStore = serde_json::from_str(&contents)?;
        Ok(store)
    }

    /// Get API key for a provider
    pub fn get(&self, provider: &ProviderId) -> Option<&String> {
        self.keys.get(provider.storage_key())
    }

    /// Stored key, falling back to the provider's environment variable
    pub fn resolve(&self, provider: &ProviderId) -> Option<String> {
        self.get(provider)
            .filter(|key| !key.trim().is_empty())
            .cloned()
            .or_else(|| {
                std::env::var(provider.env_key())
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            })
    }
}
