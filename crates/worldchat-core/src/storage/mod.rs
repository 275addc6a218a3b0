//! Persistence layer
//!
//! SQLite-based storage for:
//! - Agents (private and public)
//! - World groups and their memberships
//! - World conversation lines (append-only)
//! - Free-form prompt conversations
//! - Provider API credentials

pub mod agents;
pub mod conversations;
pub mod credentials;
mod database;
pub mod lines;
pub mod world_groups;

pub use agents::{Agent, AgentStore};
pub use conversations::{Conversation, ConversationStore};
pub use credentials::CredentialStore;
pub use database::Database;
pub use lines::{ConversationLine, LineStore};
pub use world_groups::{Theme, WorldGroup, WorldGroupStore};

use chrono::{DateTime, Utc};

/// Storage failures callers are expected to react to.
///
/// Everything else surfaces as a plain `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("An agent named '{0}' already exists")]
    NameTaken(String),
    #[error("Agent {0} is not public")]
    NotPublic(String),
    #[error("{0}")]
    Invalid(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Parse a stored RFC3339 timestamp, falling back to now for corrupt rows
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Helper to create a temporary database for testing
#[cfg(test)]
pub(crate) fn create_test_db() -> (Database, tempfile::TempDir) {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).expect("Failed to create database");
    (db, temp_dir)
}
