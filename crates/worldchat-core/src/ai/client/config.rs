//! AI Client configuration

use std::time::Duration;

use crate::ai::providers::{get_provider, ProviderId};
use crate::constants;

/// Configuration for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    /// Model ID to use for API calls
    pub model: String,
    /// Which provider this config is for
    pub provider_id: ProviderId,
    /// Optional endpoint override (defaults to the provider's endpoint)
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for AiClientConfig {
    fn default() -> Self {
        Self {
            model: constants::ai::DEFAULT_MODEL.to_string(),
            provider_id: ProviderId::DeepSeek,
            base_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl AiClientConfig {
    /// Config for a provider with its default model unless `model` is given
    pub fn for_provider(provider_id: ProviderId, model: Option<&str>) -> Self {
        let default_model = get_provider(provider_id)
            .map(|p| p.default_model())
            .unwrap_or(constants::ai::DEFAULT_MODEL);

        Self {
            model: model.unwrap_or(default_model).to_string(),
            provider_id,
            ..Default::default()
        }
    }

    /// Get the API URL to use
    pub fn api_url(&self) -> String {
        if let Some(base) = &self.base_url {
            return base.clone();
        }
        get_provider(self.provider_id)
            .map(|p| p.base_url.to_string())
            .unwrap_or_else(|| "https://api.deepseek.com/v1/chat/completions".to_string())
    }
}
