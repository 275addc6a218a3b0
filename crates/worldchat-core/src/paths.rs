//! Centralized path utilities

use std::path::PathBuf;

use crate::constants::storage;

/// Get the worldchat config directory (~/.worldchat)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(storage::CONFIG_DIR_NAME)
}

/// Get the tokens directory (~/.worldchat/tokens)
pub fn tokens_dir() -> PathBuf {
    config_dir().join("tokens")
}

/// Default SQLite database location (~/.worldchat/worldchat.db)
pub fn default_db_path() -> PathBuf {
    config_dir().join(storage::DATABASE_FILE_NAME)
}
