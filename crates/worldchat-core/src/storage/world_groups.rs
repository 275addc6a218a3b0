//! World groups and their memberships

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::agents::{Agent, AgentStore};
use super::database::Database;
use super::{parse_timestamp, StorageError};

/// World setting a group's story takes place in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[serde(alias = "玄幻")]
    Xuanhuan,
    #[serde(alias = "科幻")]
    SciFi,
    #[serde(alias = "言情")]
    Romance,
    #[serde(alias = "武侠")]
    Wuxia,
    #[serde(alias = "都市")]
    Urban,
}

impl Theme {
    pub fn all() -> &'static [Theme] {
        &[
            Theme::Xuanhuan,
            Theme::SciFi,
            Theme::Romance,
            Theme::Wuxia,
            Theme::Urban,
        ]
    }

    /// Storage key (also the wire name)
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Xuanhuan => "xuanhuan",
            Theme::SciFi => "sci_fi",
            Theme::Romance => "romance",
            Theme::Wuxia => "wuxia",
            Theme::Urban => "urban",
        }
    }

    /// Prose description used inside prompts
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Theme::Xuanhuan => "xuanhuan (eastern high fantasy)",
            Theme::SciFi => "science fiction",
            Theme::Romance => "romance",
            Theme::Wuxia => "wuxia (martial heroes)",
            Theme::Urban => "modern urban",
        }
    }

    pub fn random() -> Theme {
        *Theme::all()
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Theme::Urban)
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "xuanhuan" | "玄幻" => Ok(Theme::Xuanhuan),
            "sci_fi" | "科幻" => Ok(Theme::SciFi),
            "romance" | "言情" => Ok(Theme::Romance),
            "wuxia" | "武侠" => Ok(Theme::Wuxia),
            "urban" | "都市" => Ok(Theme::Urban),
            other => Err(StorageError::Invalid(format!("Unknown theme '{other}'"))),
        }
    }
}

/// A themed room whose members converse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldGroup {
    pub id: String,
    pub name: String,
    pub theme: Theme,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// World group persistence store
pub struct WorldGroupStore<'a> {
    db: &'a Database,
}

impl<'a> WorldGroupStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(
        &self,
        name: &str,
        theme: Theme,
        description: Option<&str>,
    ) -> Result<WorldGroup> {
        self.create_with_members(name, theme, description, &[])
    }

    /// Create a group and its initial memberships in one transaction
    ///
    /// Every agent id is checked first; an unknown id leaves nothing behind.
    pub fn create_with_members(
        &self,
        name: &str,
        theme: Theme,
        description: Option<&str>,
        agent_ids: &[String],
    ) -> Result<WorldGroup> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::Invalid("World group name is required".to_string()).into());
        }
        let agents = AgentStore::new(self.db);
        for agent_id in agent_ids {
            if agents.get(agent_id)?.is_none() {
                return Err(StorageError::not_found("Agent", agent_id).into());
            }
        }

        let group = WorldGroup {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            theme,
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };

        let tx = self.db.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO world_groups (id, name, theme, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.id,
                group.name,
                group.theme.as_str(),
                group.description,
                group.created_at.to_rfc3339()
            ],
        )?;
        for agent_id in agent_ids {
            tx.execute(
                "INSERT OR IGNORE INTO world_group_agents (world_group_id, agent_id) VALUES (?1, ?2)",
                params![group.id, agent_id],
            )?;
        }
        tx.commit()?;

        Ok(group)
    }

    pub fn get(&self, id: &str) -> Result<Option<WorldGroup>> {
        let group = self
            .db
            .conn()
            .query_row(
                "SELECT id, name, theme, description, created_at FROM world_groups WHERE id = ?1",
                [id],
                Self::map_group_row,
            )
            .optional()?;
        Ok(group)
    }

    /// List all groups, newest first
    pub fn list(&self) -> Result<Vec<WorldGroup>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, name, theme, description, created_at FROM world_groups
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let groups = stmt
            .query_map([], Self::map_group_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// Delete a group; memberships and lines cascade
    pub fn delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .db
            .conn()
            .execute("DELETE FROM world_groups WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Members of a group in the order they joined
    pub fn members(&self, group_id: &str) -> Result<Vec<Agent>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT a.id, a.name, a.description, a.is_public, a.created_at, a.user_id
             FROM world_group_agents m
             JOIN agents a ON a.id = m.agent_id
             WHERE m.world_group_id = ?1
             ORDER BY m.rowid",
        )?;
        let members = stmt
            .query_map([group_id], AgentStore::map_agent_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Add an agent to a group. Returns false when it was already a member.
    pub fn add_member(&self, group_id: &str, agent_id: &str) -> Result<bool> {
        if self.get(group_id)?.is_none() {
            return Err(StorageError::not_found("World group", group_id).into());
        }
        if AgentStore::new(self.db).get(agent_id)?.is_none() {
            return Err(StorageError::not_found("Agent", agent_id).into());
        }

        let affected = self.db.conn().execute(
            "INSERT OR IGNORE INTO world_group_agents (world_group_id, agent_id) VALUES (?1, ?2)",
            params![group_id, agent_id],
        )?;
        Ok(affected > 0)
    }

    /// Remove an agent from a group. Returns false when it was not a member.
    pub fn remove_member(&self, group_id: &str, agent_id: &str) -> Result<bool> {
        let affected = self.db.conn().execute(
            "DELETE FROM world_group_agents WHERE world_group_id = ?1 AND agent_id = ?2",
            params![group_id, agent_id],
        )?;
        Ok(affected > 0)
    }

    fn map_group_row(row: &rusqlite::Row) -> rusqlite::Result<WorldGroup> {
        let theme: String = row.get(2)?;
        let created_at: String = row.get(4)?;
        let theme = theme.parse::<Theme>().map_err(|e: StorageError| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(WorldGroup {
            id: row.get(0)?,
            name: row.get(1)?,
            theme,
            description: row.get(3)?,
            created_at: parse_timestamp(&created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::create_test_db;

    #[test]
    fn test_theme_parsing_accepts_original_labels() {
        assert_eq!("wuxia".parse::<Theme>().unwrap(), Theme::Wuxia);
        assert_eq!("科幻".parse::<Theme>().unwrap(), Theme::SciFi);
        assert!("space opera".parse::<Theme>().is_err());

        let theme: Theme = serde_json::from_str("\"都市\"").unwrap();
        assert_eq!(theme, Theme::Urban);
        assert_eq!(serde_json::to_string(&Theme::SciFi).unwrap(), "\"sci_fi\"");
    }

    #[test]
    fn test_create_requires_name() {
        let (db, _temp) = create_test_db();
        let store = WorldGroupStore::new(&db);

        let err = store.create("  ", Theme::Romance, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::Invalid(_))
        ));
    }

    #[test]
    fn test_list_newest_first() {
        let (db, _temp) = create_test_db();
        let store = WorldGroupStore::new(&db);

        let first = store.create("Old Town", Theme::Urban, None).unwrap();
        let second = store
            .create("Sky Realm", Theme::Xuanhuan, Some("cloud palaces"))
            .unwrap();

        let groups = store.list().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, second.id);
        assert_eq!(groups[1].id, first.id);
        assert_eq!(groups[0].description.as_deref(), Some("cloud palaces"));
        assert_eq!(store.get(&first.id).unwrap().unwrap().theme, Theme::Urban);
    }

    #[test]
    fn test_membership_is_unique_and_ordered() {
        let (db, _temp) = create_test_db();
        let groups = WorldGroupStore::new(&db);
        let agents = AgentStore::new(&db);

        let group = groups.create("Harbor", Theme::Wuxia, None).unwrap();
        let alice = agents.create(Some("Alice"), None, None).unwrap();
        let bob = agents.create(Some("Bob"), None, None).unwrap();

        assert!(groups.add_member(&group.id, &bob.id).unwrap());
        assert!(groups.add_member(&group.id, &alice.id).unwrap());
        assert!(!groups.add_member(&group.id, &alice.id).unwrap());

        let members = groups.members(&group.id).unwrap();
        let names: Vec<&str> = members.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Alice"]);

        assert!(groups.remove_member(&group.id, &bob.id).unwrap());
        assert!(!groups.remove_member(&group.id, &bob.id).unwrap());
        assert_eq!(groups.members(&group.id).unwrap().len(), 1);
    }

    #[test]
    fn test_add_member_rejects_unknown_ids() {
        let (db, _temp) = create_test_db();
        let groups = WorldGroupStore::new(&db);
        let agents = AgentStore::new(&db);

        let group = groups.create("Harbor", Theme::Wuxia, None).unwrap();
        let alice = agents.create(Some("Alice"), None, None).unwrap();

        assert!(groups.add_member("missing", &alice.id).is_err());
        assert!(groups.add_member(&group.id, "missing").is_err());
    }

    #[test]
    fn test_create_with_members_is_all_or_nothing() {
        let (db, _temp) = create_test_db();
        let groups = WorldGroupStore::new(&db);
        let alice = AgentStore::new(&db).create(Some("Alice"), None, None).unwrap();

        let err = groups
            .create_with_members("Harbor", Theme::Wuxia, None, &[alice.id.clone(), "nope".into()])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NotFound { .. })
        ));
        assert!(groups.list().unwrap().is_empty());

        let group = groups
            .create_with_members("Harbor", Theme::Wuxia, None, &[alice.id.clone()])
            .unwrap();
        assert_eq!(groups.members(&group.id).unwrap()[0].id, alice.id);
    }

    #[test]
    fn test_delete_cascades_memberships() {
        let (db, _temp) = create_test_db();
        let groups = WorldGroupStore::new(&db);
        let agents = AgentStore::new(&db);

        let group = groups.create("Harbor", Theme::Wuxia, None).unwrap();
        let alice = agents.create(Some("Alice"), None, None).unwrap();
        groups.add_member(&group.id, &alice.id).unwrap();

        assert!(groups.delete(&group.id).unwrap());
        assert!(groups.get(&group.id).unwrap().is_none());
        let remaining: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM world_group_agents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
