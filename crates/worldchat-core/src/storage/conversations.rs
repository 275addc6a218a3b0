//! Free-form prompt conversations
//!
//! Raw transcripts produced by the prompt flow, linked to the agents that were
//! selected when the prompt was submitted.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::Database;
use super::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub content: String,
    pub agent_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct ConversationStore<'a> {
    db: &'a Database,
}

impl<'a> ConversationStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Save a transcript and link it to its agents in one transaction
    pub fn create(&self, content: &str, agent_ids: &[String]) -> Result<Conversation> {
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            agent_ids: agent_ids.to_vec(),
            created_at: Utc::now(),
        };

        let tx = self.db.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO conversations (id, content, created_at) VALUES (?1, ?2, ?3)",
            params![
                conversation.id,
                conversation.content,
                conversation.created_at.to_rfc3339()
            ],
        )?;
        for agent_id in agent_ids {
            tx.execute(
                "INSERT OR IGNORE INTO conversation_agents (conversation_id, agent_id)
                 VALUES (?1, ?2)",
                params![conversation.id, agent_id],
            )?;
        }
        tx.commit()?;

        Ok(conversation)
    }

    /// All conversations, newest first
    pub fn list(&self) -> Result<Vec<Conversation>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, content, created_at FROM conversations
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut agents_stmt = self.db.conn().prepare(
            "SELECT agent_id FROM conversation_agents WHERE conversation_id = ?1 ORDER BY rowid",
        )?;

        rows.into_iter()
            .map(|(id, content, created_at)| -> Result<Conversation> {
                let agent_ids = agents_stmt
                    .query_map([&id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(Conversation {
                    id,
                    content,
                    agent_ids,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .collect()
    }
}
