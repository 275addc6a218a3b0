//! Persistence of parsed utterances

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use super::parser::Utterance;
use crate::storage::ConversationLine;

/// Destination for generated lines
#[async_trait]
pub trait ConversationSink: Send + Sync {
    async fn insert_line(
        &self,
        world_group_id: &str,
        agent_id: &str,
        content: &str,
    ) -> Result<ConversationLine>;
}

/// Counts from one best-effort persistence pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub parsed: usize,
    pub persisted: usize,
    pub failed: usize,
}

/// Write utterances in order, skipping rows that fail
pub async fn persist_utterances(
    sink: &dyn ConversationSink,
    world_group_id: &str,
    utterances: &[Utterance],
) -> PersistReport {
    let mut report = PersistReport {
        parsed: utterances.len(),
        ..Default::default()
    };

    for utterance in utterances {
        match sink
            .insert_line(world_group_id, &utterance.agent_id, &utterance.content)
            .await
        {
            Ok(_) => report.persisted += 1,
            Err(e) => {
                warn!(
                    group = world_group_id,
                    agent = %utterance.agent_name,
                    "Failed to persist line: {:#}",
                    e
                );
                report.failed += 1;
            }
        }
    }

    report
}
