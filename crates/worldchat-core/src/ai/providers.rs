//! AI provider configuration
//!
//! Every supported provider speaks the OpenAI chat-completions format with
//! bearer authentication; they differ in endpoint and default model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Unique identifier for each supported provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    #[default]
    DeepSeek,
    Perplexity,
    OpenAI,
}

impl ProviderId {
    pub fn all() -> &'static [ProviderId] {
        &[ProviderId::DeepSeek, ProviderId::Perplexity, ProviderId::OpenAI]
    }

    /// Get the storage key for this provider (used in credentials.json)
    pub fn storage_key(&self) -> &'static str {
        match self {
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Perplexity => "perplexity",
            ProviderId::OpenAI => "openai",
        }
    }

    /// Environment variable consulted when no key is stored
    pub fn env_key(&self) -> &'static str {
        match self {
            ProviderId::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderId::Perplexity => "PERPLEXITY_API_KEY",
            ProviderId::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Parse provider from an environment value
    pub fn parse(s: &str) -> Option<ProviderId> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Some(ProviderId::DeepSeek),
            "perplexity" | "pplx" => Some(ProviderId::Perplexity),
            "openai" => Some(ProviderId::OpenAI),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::DeepSeek => write!(f, "DeepSeek"),
            ProviderId::Perplexity => write!(f, "Perplexity"),
            ProviderId::OpenAI => write!(f, "OpenAI"),
        }
    }
}

/// Static configuration for a provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub name: &'static str,
    /// Full chat-completions endpoint
    pub base_url: &'static str,
    pub models: &'static [&'static str],
}

impl ProviderConfig {
    /// First listed model is the default
    pub fn default_model(&self) -> &'static str {
        self.models.first().copied().unwrap_or_default()
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.models.contains(&model)
    }
}

static BUILTIN_PROVIDERS: LazyLock<Vec<ProviderConfig>> = LazyLock::new(|| {
    vec![
        ProviderConfig {
            id: ProviderId::DeepSeek,
            name: "DeepSeek",
            base_url: "https://api.deepseek.com/v1/chat/completions",
            models: &["deepseek-chat", "deepseek-reasoner"],
        },
        ProviderConfig {
            id: ProviderId::Perplexity,
            name: "Perplexity",
            base_url: "https://api.perplexity.ai/chat/completions",
            models: &["llama-3.1-sonar-small-128k-online", "sonar", "sonar-pro"],
        },
        ProviderConfig {
            id: ProviderId::OpenAI,
            name: "OpenAI",
            base_url: "https://api.openai.com/v1/chat/completions",
            models: &["gpt-4o-mini", "gpt-4o"],
        },
    ]
});

pub fn builtin_providers() -> &'static [ProviderConfig] {
    &BUILTIN_PROVIDERS
}

/// Get a specific provider configuration by ID
pub fn get_provider(id: ProviderId) -> Option<&'static ProviderConfig> {
    BUILTIN_PROVIDERS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_display() {
        assert_eq!(ProviderId::DeepSeek.to_string(), "DeepSeek");
        assert_eq!(ProviderId::Perplexity.to_string(), "Perplexity");
        assert_eq!(ProviderId::OpenAI.to_string(), "OpenAI");
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(ProviderId::parse("DeepSeek"), Some(ProviderId::DeepSeek));
        assert_eq!(ProviderId::parse(" pplx "), Some(ProviderId::Perplexity));
        assert_eq!(ProviderId::parse("minimax"), None);
    }

    #[test]
    fn test_every_provider_is_registered() {
        for id in ProviderId::all() {
            let provider = get_provider(*id).unwrap();
            assert!(provider.base_url.starts_with("https://"));
            assert!(provider.has_model(provider.default_model()));
        }
    }

    #[test]
    fn test_deepseek_defaults() {
        let provider = get_provider(ProviderId::DeepSeek).unwrap();
        assert_eq!(provider.default_model(), "deepseek-chat");
        assert_eq!(ProviderId::DeepSeek.env_key(), "DEEPSEEK_API_KEY");
    }
}
