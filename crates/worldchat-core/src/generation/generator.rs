//! Generation seams and the LLM-backed generator

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::policy::GenerationMode;
use crate::ai::client::ChatRequest;
use crate::ai::prompts::{self, Persona};
use crate::ai::retry::{with_retry, RetryConfig};
use crate::ai::{AiClient, AiError};
use crate::constants::ai::{CONTINUE_PROMPT, ENSEMBLE_MAX_TOKENS, TURN_MAX_TOKENS};
use crate::storage::{Agent, ConversationLine, WorldGroup};

/// Failure of one generation attempt
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Missing or rejected credentials; retrying will not help
    #[error("generation is not configured: {0}")]
    Configuration(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("group lookup failed: {0}")]
    Directory(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Configuration(_))
    }
}

impl From<AiError> for GenerationError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Transport(e) => GenerationError::Transport(e.to_string()),
            AiError::Provider { status, message } if matches!(status, 401 | 403) => {
                GenerationError::Configuration(format!("provider rejected the API key: {message}"))
            }
            AiError::Provider { status, message } => GenerationError::Provider {
                status,
                body: message,
            },
            AiError::MalformedResponse(msg) => GenerationError::MalformedResponse(msg),
        }
    }
}

/// Everything one autonomous cycle needs to know about a group
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    pub group: WorldGroup,
    /// Membership order
    pub members: Vec<Agent>,
    /// Most recent lines, oldest first
    pub recent_lines: Vec<ConversationLine>,
}

impl GroupSnapshot {
    /// `Name: text` transcript of the recent lines
    pub fn transcript(&self) -> String {
        let names: HashMap<&str, &str> = self
            .members
            .iter()
            .map(|m| (m.id.as_str(), m.name.as_str()))
            .collect();

        self.recent_lines
            .iter()
            .filter_map(|line| {
                let name = names.get(line.agent_id.as_str())?;
                Some(format!("{}: {}", name, line.content))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Source of group snapshots
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn snapshot(&self, world_group_id: &str) -> Result<GroupSnapshot, GenerationError>;
}

/// Produces raw model output in `Name: text` form
#[async_trait]
pub trait ConversationGenerator: Send + Sync {
    /// One autonomous cycle for a group
    async fn continue_group(&self, snapshot: &GroupSnapshot) -> Result<String, GenerationError>;

    /// A user-prompted conversation among `agents`
    async fn compose(&self, agents: &[Agent], prompt: &str) -> Result<String, GenerationError>;
}

/// The member who speaks after the last speaker, wrapping around
///
/// Falls back to the first member when there is no history or the last
/// speaker has left the group.
pub fn next_speaker<'a>(members: &'a [Agent], recent_lines: &[ConversationLine]) -> Option<&'a Agent> {
    let last_speaker = recent_lines.last().map(|line| line.agent_id.as_str());
    let next_index = last_speaker
        .and_then(|id| members.iter().position(|m| m.id == id))
        .map(|i| (i + 1) % members.len())
        .unwrap_or(0);
    members.get(next_index)
}

/// Generator backed by a chat-completions provider
///
/// Without a client every call fails with `GenerationError::Configuration`.
pub struct LlmGenerator {
    client: Option<Arc<AiClient>>,
    mode: GenerationMode,
    compose_retry: RetryConfig,
}

impl LlmGenerator {
    pub fn new(client: Option<Arc<AiClient>>, mode: GenerationMode) -> Self {
        Self {
            client,
            mode,
            compose_retry: RetryConfig::default().with_max_retries(2),
        }
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    fn client(&self) -> Result<&AiClient, GenerationError> {
        self.client.as_deref().ok_or_else(|| {
            GenerationError::Configuration("no API key configured for the provider".to_string())
        })
    }

    async fn ensemble(&self, snapshot: &GroupSnapshot) -> Result<String, GenerationError> {
        let personas: Vec<Persona> = snapshot.members.iter().map(Persona::from).collect();
        let request = ChatRequest::new(
            prompts::ensemble_system_prompt(&personas, CONTINUE_PROMPT, Some(snapshot.group.theme)),
            CONTINUE_PROMPT,
        )
        .with_max_tokens(ENSEMBLE_MAX_TOKENS);

        Ok(self.client()?.chat(&request).await?)
    }

    async fn turn(&self, snapshot: &GroupSnapshot) -> Result<String, GenerationError> {
        let speaker = next_speaker(&snapshot.members, &snapshot.recent_lines).ok_or_else(|| {
            GenerationError::Directory(format!("group {} has no members", snapshot.group.id))
        })?;
        let persona = Persona::from(speaker);
        let theme = snapshot.group.theme;

        debug!(group = %snapshot.group.id, speaker = %speaker.name, "Generating turn");

        let request = ChatRequest::new(
            prompts::turn_system_prompt(&persona, theme),
            prompts::turn_user_message(&persona, theme, &snapshot.transcript()),
        )
        .with_max_tokens(TURN_MAX_TOKENS);

        let reply = self.client()?.chat(&request).await?;
        Ok(format!("{}: {}", speaker.name, strip_own_name(&reply, &speaker.name)))
    }
}

/// Models sometimes prefix their turn with their own name despite being told not to
fn strip_own_name<'a>(reply: &'a str, name: &str) -> &'a str {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix([':', '：']))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[async_trait]
impl ConversationGenerator for LlmGenerator {
    async fn continue_group(&self, snapshot: &GroupSnapshot) -> Result<String, GenerationError> {
        match self.mode {
            GenerationMode::Ensemble => self.ensemble(snapshot).await,
            GenerationMode::Turn => self.turn(snapshot).await,
        }
    }

    async fn compose(&self, agents: &[Agent], prompt: &str) -> Result<String, GenerationError> {
        let client = self.client()?;
        let personas: Vec<Persona> = agents.iter().map(Persona::from).collect();
        let request = ChatRequest::new(prompts::ensemble_system_prompt(&personas, prompt, None), prompt)
            .with_max_tokens(ENSEMBLE_MAX_TOKENS);

        let reply = with_retry(&self.compose_retry, || client.chat(&request)).await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Theme;
    use chrono::Utc;

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: name.to_string(),
            description: "test".to_string(),
            is_public: false,
            created_at: Utc::now(),
            user_id: None,
        }
    }

    fn line(agent_id: &str, content: &str) -> ConversationLine {
        ConversationLine {
            id: uuid::Uuid::new_v4().to_string(),
            world_group_id: "g1".to_string(),
            agent_id: agent_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    fn snapshot(members: Vec<Agent>, recent_lines: Vec<ConversationLine>) -> GroupSnapshot {
        GroupSnapshot {
            group: WorldGroup {
                id: "g1".to_string(),
                name: "Test world".to_string(),
                theme: Theme::Wuxia,
                description: None,
                created_at: Utc::now(),
            },
            members,
            recent_lines,
        }
    }

    #[test]
    fn test_next_speaker_round_robin() {
        let members = vec![agent("a", "Alice"), agent("b", "Bob"), agent("c", "Cid")];

        assert_eq!(next_speaker(&members, &[]).unwrap().id, "a");
        assert_eq!(next_speaker(&members, &[line("a", "hi")]).unwrap().id, "b");
        assert_eq!(next_speaker(&members, &[line("a", "hi"), line("c", "yo")]).unwrap().id, "a");
        assert_eq!(next_speaker(&members, &[line("gone", "bye")]).unwrap().id, "a");
        assert!(next_speaker(&[], &[line("a", "hi")]).is_none());
    }

    #[test]
    fn test_transcript_skips_departed_members() {
        let snap = snapshot(
            vec![agent("a", "Alice"), agent("b", "Bob")],
            vec![line("a", "hello"), line("x", "ghost"), line("b", "hi")],
        );
        assert_eq!(snap.transcript(), "Alice: hello\nBob: hi");
    }

    #[test]
    fn test_strip_own_name() {
        assert_eq!(strip_own_name("Alice: I draw my sword", "Alice"), "I draw my sword");
        assert_eq!(strip_own_name("  I draw my sword ", "Alice"), "I draw my sword");
        assert_eq!(strip_own_name("Alicesmiles", "Alice"), "Alicesmiles");
    }

    #[test]
    fn test_error_classification() {
        assert!(!GenerationError::Configuration("x".into()).is_retryable());
        assert!(GenerationError::Transport("x".into()).is_retryable());
        assert!(GenerationError::Directory("x".into()).is_retryable());

        let unauthorized: GenerationError = AiError::Provider {
            status: 401,
            message: "invalid key".into(),
        }
        .into();
        assert!(matches!(unauthorized, GenerationError::Configuration(_)));

        let throttled: GenerationError = AiError::Provider {
            status: 429,
            message: "slow down".into(),
        }
        .into();
        assert!(throttled.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_client_is_configuration_error() {
        let generator = LlmGenerator::new(None, GenerationMode::Turn);
        let snap = snapshot(vec![agent("a", "Alice")], vec![]);

        let err = generator.continue_group(&snap).await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));

        let err = generator.compose(&snap.members, "hello").await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
    }
}
