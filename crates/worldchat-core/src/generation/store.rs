//! SQLite-backed directory and sink
//!
//! Each call opens its own connection on the blocking pool, so nothing
//! holding a `rusqlite::Connection` crosses an await point.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use super::generator::{GenerationError, GroupDirectory, GroupSnapshot};
use super::sink::ConversationSink;
use crate::constants::ai::TURN_CONTEXT_LINES;
use crate::realtime::{ConversationHub, GroupEvent};
use crate::storage::{ConversationLine, Database, LineStore, StorageError, WorldGroupStore};

pub struct SqliteDirectory {
    db_path: PathBuf,
}

impl SqliteDirectory {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

#[async_trait]
impl GroupDirectory for SqliteDirectory {
    async fn snapshot(&self, world_group_id: &str) -> Result<GroupSnapshot, GenerationError> {
        let db_path = self.db_path.clone();
        let group_id = world_group_id.to_string();

        let result = tokio::task::spawn_blocking(move || -> Result<GroupSnapshot> {
            let db = Database::new(&db_path)?;
            let groups = WorldGroupStore::new(&db);
            let group = groups
                .get(&group_id)?
                .ok_or_else(|| StorageError::not_found("World group", &group_id))?;
            let members = groups.members(&group_id)?;
            let recent_lines = LineStore::new(&db).recent(&group_id, TURN_CONTEXT_LINES)?;
            Ok(GroupSnapshot {
                group,
                members,
                recent_lines,
            })
        })
        .await
        .map_err(|e| GenerationError::Directory(e.to_string()))?;

        result.map_err(|e| GenerationError::Directory(format!("{e:#}")))
    }
}

/// Writes lines to SQLite and announces each one on the hub
pub struct SqliteSink {
    db_path: PathBuf,
    hub: ConversationHub,
}

impl SqliteSink {
    pub fn new(db_path: impl Into<PathBuf>, hub: ConversationHub) -> Self {
        Self {
            db_path: db_path.into(),
            hub,
        }
    }
}

#[async_trait]
impl ConversationSink for SqliteSink {
    async fn insert_line(
        &self,
        world_group_id: &str,
        agent_id: &str,
        content: &str,
    ) -> Result<ConversationLine> {
        let db_path = self.db_path.clone();
        let (group_id, agent_id, content) = (
            world_group_id.to_string(),
            agent_id.to_string(),
            content.to_string(),
        );

        let line = tokio::task::spawn_blocking(move || {
            let db = Database::new(&db_path)?;
            LineStore::new(&db).insert(&group_id, &agent_id, &content)
        })
        .await??;

        self.hub.publish(
            world_group_id,
            GroupEvent::LineInserted { line: line.clone() },
        );
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AgentStore;
    use crate::storage::Theme;

    #[tokio::test]
    async fn test_snapshot_and_sink_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let (group_id, alice_id) = {
            let db = Database::new(&db_path).unwrap();
            let alice = AgentStore::new(&db)
                .create(Some("Alice"), Some("a mage"), None)
                .unwrap();
            let groups = WorldGroupStore::new(&db);
            let group = groups.create("Tower", Theme::Xuanhuan, None).unwrap();
            groups.add_member(&group.id, &alice.id).unwrap();
            (group.id, alice.id)
        };

        let hub = ConversationHub::new();
        let mut events = hub.subscribe(&group_id);
        let sink = SqliteSink::new(&db_path, hub.clone());
        sink.insert_line(&group_id, &alice_id, "The tower hums.")
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            GroupEvent::LineInserted { line } => assert_eq!(line.content, "The tower hums."),
            other => panic!("unexpected event {other:?}"),
        }

        let snapshot = SqliteDirectory::new(&db_path)
            .snapshot(&group_id)
            .await
            .unwrap();
        assert_eq!(snapshot.group.name, "Tower");
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.transcript(), "Alice: The tower hums.");
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_group_is_directory_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let directory = SqliteDirectory::new(temp_dir.path().join("test.db"));

        let err = directory.snapshot("missing").await.unwrap_err();
        assert!(matches!(err, GenerationError::Directory(_)));
    }

    #[tokio::test]
    async fn test_sink_rejects_unknown_agent() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let group_id = {
            let db = Database::new(&db_path).unwrap();
            WorldGroupStore::new(&db)
                .create("Tower", Theme::Urban, None)
                .unwrap()
                .id
        };

        let sink = SqliteSink::new(&db_path, ConversationHub::new());
        assert!(sink.insert_line(&group_id, "ghost", "boo").await.is_err());
    }
}
