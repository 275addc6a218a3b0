//! Scheduler timing and retry configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai::retry::RetryConfig;
use crate::constants::generation::MIN_REQUEST_INTERVAL_MS;

/// How an autonomous cycle asks the model for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// One request voicing every member at once
    #[default]
    Ensemble,
    /// One request per cycle for the next speaker in round-robin order
    Turn,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Ensemble => f.write_str("ensemble"),
            GenerationMode::Turn => f.write_str("turn"),
        }
    }
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ensemble" => Ok(GenerationMode::Ensemble),
            "turn" => Ok(GenerationMode::Turn),
            other => Err(format!("unknown generation mode '{other}'")),
        }
    }
}

/// Per-group scheduler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationPolicy {
    /// Cadence of the periodic timer, also the soft rate limit between requests
    pub min_interval: Duration,
    /// Backoff curve and retry ceiling
    pub retry: RetryConfig,
    pub mode: GenerationMode,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(MIN_REQUEST_INTERVAL_MS),
            retry: RetryConfig::default(),
            mode: GenerationMode::default(),
        }
    }
}

impl GenerationPolicy {
    /// Defaults overridden by `WORLDCHAT_INTERVAL_MS`, `WORLDCHAT_MAX_RETRIES`
    /// and `WORLDCHAT_GENERATION_MODE`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut policy = Self::default();

        if let Some(raw) = lookup("WORLDCHAT_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => policy.min_interval = Duration::from_millis(ms),
                _ => tracing::warn!("Ignoring invalid WORLDCHAT_INTERVAL_MS '{}'", raw),
            }
        }

        if let Some(raw) = lookup("WORLDCHAT_MAX_RETRIES") {
            match raw.trim().parse::<u32>() {
                Ok(n) => policy.retry.max_retries = n,
                Err(_) => tracing::warn!("Ignoring invalid WORLDCHAT_MAX_RETRIES '{}'", raw),
            }
        }

        if let Some(raw) = lookup("WORLDCHAT_GENERATION_MODE") {
            match raw.parse() {
                Ok(mode) => policy.mode = mode,
                Err(e) => tracing::warn!("Ignoring WORLDCHAT_GENERATION_MODE: {}", e),
            }
        }

        policy
    }

    /// Backoff before the retry following `retry_count` earlier retries
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        self.retry.delay_for_attempt(retry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_backoff_delays() {
        let policy = GenerationPolicy::default();
        assert_eq!(policy.retry_delay(0), Duration::from_millis(5000));
        assert_eq!(policy.retry_delay(1), Duration::from_millis(10000));
        assert_eq!(policy.retry_delay(2), Duration::from_millis(20000));
        assert_eq!(policy.retry_delay(3), Duration::from_millis(30000));
        assert_eq!(policy.retry_delay(10), Duration::from_millis(30000));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WORLDCHAT_INTERVAL_MS", "2000"),
            ("WORLDCHAT_MAX_RETRIES", "2"),
            ("WORLDCHAT_GENERATION_MODE", "Turn"),
        ]);
        let policy = GenerationPolicy::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(policy.min_interval, Duration::from_secs(2));
        assert_eq!(policy.retry.max_retries, 2);
        assert_eq!(policy.mode, GenerationMode::Turn);
    }

    #[test]
    fn test_invalid_env_keeps_defaults() {
        let policy = GenerationPolicy::from_lookup(|k| match k {
            "WORLDCHAT_INTERVAL_MS" => Some("soon".to_string()),
            "WORLDCHAT_GENERATION_MODE" => Some("chorus".to_string()),
            _ => None,
        });
        assert_eq!(policy, GenerationPolicy::default());
    }
}
