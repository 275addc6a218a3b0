//! World conversation lines
//!
//! Lines are append-only. Display order is creation time, with insertion order
//! breaking ties between rows written in the same instant.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::Database;
use super::parse_timestamp;

/// One utterance by an agent inside a world group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationLine {
    pub id: String,
    pub world_group_id: String,
    pub agent_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Line persistence store
pub struct LineStore<'a> {
    db: &'a Database,
}

impl<'a> LineStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn insert(
        &self,
        world_group_id: &str,
        agent_id: &str,
        content: &str,
    ) -> Result<ConversationLine> {
        let line = ConversationLine {
            id: uuid::Uuid::new_v4().to_string(),
            world_group_id: world_group_id.to_string(),
            agent_id: agent_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.db.conn().execute(
            "INSERT INTO world_conversations (id, world_group_id, agent_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                line.id,
                line.world_group_id,
                line.agent_id,
                line.content,
                line.created_at.to_rfc3339()
            ],
        )?;

        Ok(line)
    }

    /// All lines of a group, oldest first
    pub fn list(&self, world_group_id: &str) -> Result<Vec<ConversationLine>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, world_group_id, agent_id, content, created_at
             FROM world_conversations WHERE world_group_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let lines = stmt
            .query_map([world_group_id], Self::map_line_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    /// The last `limit` lines of a group, oldest first
    pub fn recent(&self, world_group_id: &str, limit: usize) -> Result<Vec<ConversationLine>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, world_group_id, agent_id, content, created_at
             FROM world_conversations WHERE world_group_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let mut lines = stmt
            .query_map(params![world_group_id, limit as i64], Self::map_line_row)?
            .collect::<Result<Vec<_>, _>>()?;
        lines.reverse();
        Ok(lines)
    }

    pub fn count(&self, world_group_id: &str) -> Result<usize> {
        let count: i64 = self.db.conn().query_row(
            "SELECT COUNT(*) FROM world_conversations WHERE world_group_id = ?1",
            [world_group_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn map_line_row(row: &rusqlite::Row) -> rusqlite::Result<ConversationLine> {
        let created_at: String = row.get(4)?;
        Ok(ConversationLine {
            id: row.get(0)?,
            world_group_id: row.get(1)?,
            agent_id: row.get(2)?,
            content: row.get(3)?,
            created_at: parse_timestamp(&created_at),
        })
    }
}
