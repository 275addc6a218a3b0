//! AI provider integration
//!
//! OpenAI-compatible chat-completions client, provider registry, prompt
//! builders, and HTTP-level retry helpers.

pub mod client;
pub mod prompts;
pub mod providers;
pub mod retry;

pub use client::{AiClient, AiClientConfig, AiError};
pub use providers::{get_provider, ProviderId};
