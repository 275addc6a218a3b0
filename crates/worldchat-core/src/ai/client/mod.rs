//! AI API client
//!
//! Non-streaming chat-completions calls against the configured provider.

mod config;
mod core;
mod error;
mod simple;

pub use self::core::AiClient;
pub use config::AiClientConfig;
pub use error::AiError;
pub use simple::ChatRequest;
