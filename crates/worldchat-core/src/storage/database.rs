//! SQLite connection and schema migrations

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version, tracked in `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_public INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    user_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_agents_public ON agents(is_public);

CREATE TABLE IF NOT EXISTS world_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    theme TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS world_group_agents (
    world_group_id TEXT NOT NULL REFERENCES world_groups(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    PRIMARY KEY (world_group_id, agent_id)
);

CREATE TABLE IF NOT EXISTS world_conversations (
    id TEXT PRIMARY KEY,
    world_group_id TEXT NOT NULL REFERENCES world_groups(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_world_conversations_group
    ON world_conversations(world_group_id, created_at);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_agents (
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    PRIMARY KEY (conversation_id, agent_id)
);
";

/// Owned SQLite connection with the WorldChat schema applied
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` and bring the schema up to date
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Borrow the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn run_migrations(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 {
            self.conn
                .execute_batch(SCHEMA_V1)
                .context("Failed to apply schema v1")?;
        }

        if version < SCHEMA_VERSION {
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
            tracing::debug!(from = version, to = SCHEMA_VERSION, "Database schema migrated");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn creates_schema_and_is_reopenable() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("nested").join("test.db");

        {
            let db = Database::new(&db_path).expect("Failed to create database");
            let version: i32 = db
                .conn()
                .query_row("PRAGMA user_version", [], |row| row.get(0))
                .unwrap();
            assert_eq!(version, SCHEMA_VERSION);
        }

        let db = Database::new(&db_path).expect("Failed to reopen database");
        let tables: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('agents', 'world_groups', 'world_group_agents',
                              'world_conversations', 'conversations', 'conversation_agents')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();

        let result = db.conn().execute(
            "INSERT INTO world_group_agents (world_group_id, agent_id) VALUES ('nope', 'nope')",
            [],
        );
        assert!(result.is_err());
    }
}
