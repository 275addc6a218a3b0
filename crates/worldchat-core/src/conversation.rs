//! Prompt flow: selected agents plus a user prompt become a new world group
//!
//! The raw transcript is archived as a free-form conversation, then split into
//! lines inside a freshly created group with a random theme.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::generation::{
    parse_response, persist_utterances, ConversationGenerator, ConversationSink, PersistReport,
    Utterance,
};
use crate::storage::{
    Agent, AgentStore, Conversation, ConversationStore, Database, StorageError, Theme, WorldGroup,
    WorldGroupStore,
};

/// Everything the prompt flow produced
#[derive(Debug, Clone, Serialize)]
pub struct ConversationOutcome {
    pub conversation: Conversation,
    pub world_group: WorldGroup,
    pub report: PersistReport,
}

/// Run one prompt through the model and seed a world group with the result
pub async fn start_conversation(
    db_path: &Path,
    generator: &dyn ConversationGenerator,
    sink: &dyn ConversationSink,
    agent_ids: &[String],
    prompt: &str,
) -> Result<ConversationOutcome> {
    let prompt = prompt.trim();
    if agent_ids.is_empty() {
        return Err(StorageError::Invalid("Select at least one agent".to_string()).into());
    }
    if prompt.is_empty() {
        return Err(StorageError::Invalid("Prompt must not be empty".to_string()).into());
    }

    let agents = {
        let db = Database::new(db_path)?;
        AgentStore::new(&db).get_many(agent_ids)?
    };

    info!(
        agents = %agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", "),
        "Generating conversation"
    );
    let transcript = generator.compose(&agents, prompt).await?;

    let (conversation, world_group) = {
        let db = Database::new(db_path)?;
        let conversation = ConversationStore::new(&db).create(&transcript, agent_ids)?;

        let theme = Theme::random();
        let world_group = WorldGroupStore::new(&db).create_with_members(
            &group_name(&agents, theme),
            theme,
            Some(&group_description(&agents, prompt)),
            agent_ids,
        )?;
        (conversation, world_group)
    };

    let mut utterances = parse_response(&transcript, &agents);
    if utterances.is_empty() {
        warn!(
            group = %world_group.id,
            "No speaker lines in transcript, storing it as a single line"
        );
        utterances = fallback_utterance(&agents, &transcript).into_iter().collect();
    }

    let report = persist_utterances(sink, &world_group.id, &utterances).await;
    info!(
        group = %world_group.id,
        persisted = report.persisted,
        "World group created from prompt"
    );

    Ok(ConversationOutcome {
        conversation,
        world_group,
        report,
    })
}

fn group_name(agents: &[Agent], theme: Theme) -> String {
    let lead = agents.first().map(|a| a.name.as_str()).unwrap_or("Nobody");
    format!("{}'s {} world", lead, theme.prompt_label())
}

fn group_description(agents: &[Agent], prompt: &str) -> String {
    let names: Vec<&str> = agents.iter().map(|a| a.name.as_str()).collect();
    format!("{} meet around \"{}\"", names.join(", "), prompt)
}

fn fallback_utterance(agents: &[Agent], transcript: &str) -> Option<Utterance> {
    let content = transcript.trim();
    let first = agents.first()?;
    if content.is_empty() {
        return None;
    }
    Some(Utterance {
        agent_id: first.id.clone(),
        agent_name: first.name.clone(),
        content: content.to_string(),
    })
}
