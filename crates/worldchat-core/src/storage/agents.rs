//! Agent CRUD operations
//!
//! Agents start private to their creator. Sharing flips `is_public`; copying a
//! public agent creates a fresh private agent with the same persona.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::database::Database;
use super::{parse_timestamp, StorageError};
use crate::constants::storage::{DEFAULT_AGENT_DESCRIPTION, DEFAULT_AGENT_NAME};

/// A named persona used to parameterize generation prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    /// Owner in multi-tenant mode
    pub user_id: Option<String>,
}

/// Agent persistence store
pub struct AgentStore<'a> {
    db: &'a Database,
}

const AGENT_COLUMNS: &str = "id, name, description, is_public, created_at, user_id";

impl<'a> AgentStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a private agent
    ///
    /// A blank name or description falls back to the defaults. The name must not
    /// collide with another private agent of the same owner.
    pub fn create(
        &self,
        name: Option<&str>,
        description: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Agent> {
        let name = non_blank(name).unwrap_or(DEFAULT_AGENT_NAME);
        let description = non_blank(description).unwrap_or(DEFAULT_AGENT_DESCRIPTION);

        if self.private_name_exists(name, user_id)? {
            return Err(StorageError::NameTaken(name.to_string()).into());
        }

        self.insert(name, description, false, user_id)
    }

    /// Copy a public agent into the caller's private agents
    pub fn copy_public(&self, id: &str, user_id: Option<&str>) -> Result<Agent> {
        let source = self
            .get(id)?
            .ok_or_else(|| StorageError::not_found("Agent", id))?;
        if !source.is_public {
            return Err(StorageError::NotPublic(id.to_string()).into());
        }

        let copy = self.insert(&source.name, &source.description, false, user_id)?;
        tracing::debug!(source = %source.id, copy = %copy.id, "Copied public agent");
        Ok(copy)
    }

    /// Flip an agent to public
    pub fn share(&self, id: &str) -> Result<Agent> {
        let affected = self
            .db
            .conn()
            .execute("UPDATE agents SET is_public = 1 WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(StorageError::not_found("Agent", id).into());
        }

        self.get(id)?
            .ok_or_else(|| StorageError::not_found("Agent", id).into())
    }

    /// Delete an agent; memberships and its lines go with it
    pub fn delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .db
            .conn()
            .execute("DELETE FROM agents WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Verify agent belongs to user (multi-tenant ownership check)
    ///
    /// Any existing agent passes when `user_id` is None (single-tenant mode).
    pub fn verify_ownership(&self, id: &str, user_id: Option<&str>) -> Result<bool> {
        let count: i64 = match user_id {
            Some(uid) => self.db.conn().query_row(
                "SELECT COUNT(*) FROM agents WHERE id = ?1 AND user_id = ?2",
                params![id, uid],
                |row| row.get(0),
            )?,
            None => self.db.conn().query_row(
                "SELECT COUNT(*) FROM agents WHERE id = ?1",
                [id],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<Agent>> {
        let agent = self
            .db
            .conn()
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                [id],
                Self::map_agent_row,
            )
            .optional()?;
        Ok(agent)
    }

    /// Fetch agents by id, keeping the order of `ids`
    ///
    /// Fails if any id is unknown.
    pub fn get_many(&self, ids: &[String]) -> Result<Vec<Agent>> {
        ids.iter()
            .map(|id| -> Result<Agent> {
                self.get(id)?
                    .ok_or_else(|| StorageError::not_found("Agent", id).into())
            })
            .collect()
    }

    /// List the caller's private agents, oldest first
    pub fn list_private(&self, user_id: Option<&str>) -> Result<Vec<Agent>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents
             WHERE is_public = 0 AND user_id IS ?1
             ORDER BY created_at, rowid"
        ))?;
        let agents = stmt
            .query_map([user_id], Self::map_agent_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(agents)
    }

    /// List every public agent, oldest first
    pub fn list_public(&self) -> Result<Vec<Agent>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE is_public = 1 ORDER BY created_at, rowid"
        ))?;
        let agents = stmt
            .query_map([], Self::map_agent_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(agents)
    }

    fn insert(
        &self,
        name: &str,
        description: &str,
        is_public: bool,
        user_id: Option<&str>,
    ) -> Result<Agent> {
        let agent = Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            is_public,
            created_at: Utc::now(),
            user_id: user_id.map(str::to_string),
        };

        self.db.conn().execute(
            "INSERT INTO agents (id, name, description, is_public, created_at, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                agent.id,
                agent.name,
                agent.description,
                agent.is_public,
                agent.created_at.to_rfc3339(),
                agent.user_id
            ],
        )?;

        Ok(agent)
    }

    fn private_name_exists(&self, name: &str, user_id: Option<&str>) -> Result<bool> {
        let count: i64 = self.db.conn().query_row(
            "SELECT COUNT(*) FROM agents WHERE is_public = 0 AND name = ?1 AND user_id IS ?2",
            params![name, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Helper to map a row to Agent
    pub(crate) fn map_agent_row(row: &rusqlite::Row) -> rusqlite::Result<Agent> {
        let created_at: String = row.get(4)?;
        Ok(Agent {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            is_public: row.get(3)?,
            created_at: parse_timestamp(&created_at),
            user_id: row.get(5)?,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
