//! WorldChat Core
//!
//! Agents, world groups, SQLite storage, the AI provider client, and the
//! autonomous conversation-generation loop shared by the server.

pub mod ai;
pub mod constants;
pub mod conversation;
pub mod generation;
pub mod paths;
pub mod realtime;
pub mod storage;

pub use conversation::{start_conversation, ConversationOutcome};
pub use generation::{GenerationPolicy, SchedulerRegistry};
pub use realtime::{ConversationHub, GroupEvent};
pub use storage::{AgentStore, Database, WorldGroupStore};
