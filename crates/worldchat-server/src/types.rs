//! Request and response types for the API

use serde::{Deserialize, Serialize};

use worldchat_core::generation::{PersistReport, SchedulerStatus};
use worldchat_core::storage::{Agent, Conversation, ConversationLine, Theme, WorldGroup};
use worldchat_core::ConversationOutcome;

// ============================================================================
// Agent Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: String,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            description: agent.description,
            is_public: agent.is_public,
            created_at: agent.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// World Group Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateWorldGroupRequest {
    pub name: String,
    pub theme: Theme,
    pub description: Option<String>,
    /// Initial members, added in order
    #[serde(default)]
    pub agent_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WorldGroupResponse {
    pub id: String,
    pub name: String,
    pub theme: Theme,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<WorldGroup> for WorldGroupResponse {
    fn from(group: WorldGroup) -> Self {
        Self {
            id: group.id,
            name: group.name,
            theme: group.theme,
            description: group.description,
            created_at: group.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorldGroupDetailResponse {
    #[serde(flatten)]
    pub group: WorldGroupResponse,
    pub members: Vec<AgentResponse>,
    pub generation: SchedulerStatus,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub agent_id: String,
}

#[derive(Debug, Serialize)]
pub struct LineResponse {
    pub id: String,
    pub agent_id: String,
    pub content: String,
    pub created_at: String,
}

impl From<ConversationLine> for LineResponse {
    fn from(line: ConversationLine) -> Self {
        Self {
            id: line.id,
            agent_id: line.agent_id,
            content: line.content,
            created_at: line.created_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Conversation Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub agent_ids: Vec<String>,
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub content: String,
    pub agent_ids: Vec<String>,
    pub created_at: String,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id,
            content: conversation.content,
            agent_ids: conversation.agent_ids,
            created_at: conversation.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartConversationResponse {
    pub conversation: ConversationResponse,
    pub world_group: WorldGroupResponse,
    pub lines: PersistReport,
}

impl From<ConversationOutcome> for StartConversationResponse {
    fn from(outcome: ConversationOutcome) -> Self {
        Self {
            conversation: outcome.conversation.into(),
            world_group: outcome.world_group.into(),
            lines: outcome.report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_group_accepts_original_theme_labels() {
        let req: CreateWorldGroupRequest = serde_json::from_value(json!({
            "name": "Jianghu",
            "theme": "武侠"
        }))
        .expect("request should deserialize");
        assert_eq!(req.theme, Theme::Wuxia);
        assert!(req.agent_ids.is_empty());
    }

    #[test]
    fn create_group_rejects_unknown_theme() {
        let result = serde_json::from_value::<CreateWorldGroupRequest>(json!({
            "name": "Somewhere",
            "theme": "steampunk"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn create_agent_fields_are_optional() {
        let req: CreateAgentRequest =
            serde_json::from_value(json!({})).expect("request should deserialize");
        assert!(req.name.is_none());
        assert!(req.description.is_none());
    }
}
