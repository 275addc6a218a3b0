//! Autonomous conversation generation
//!
//! One scheduler per world group periodically asks the model to continue the
//! group's story, parses the reply into per-agent lines and persists them.
//! Failures back off exponentially until the retry budget is spent, after
//! which the scheduler pauses itself until a user resumes it.

mod generator;
mod parser;
mod policy;
mod scheduler;
mod sink;
mod state;
mod store;

pub use generator::{
    next_speaker, ConversationGenerator, GenerationError, GroupDirectory, GroupSnapshot,
    LlmGenerator,
};
pub use parser::{parse_response, Utterance};
pub use policy::{GenerationMode, GenerationPolicy};
pub use scheduler::{
    GenerationScheduler, SchedulerDeps, SchedulerHandle, SchedulerRegistry, SchedulerStatus,
};
pub use sink::{persist_utterances, ConversationSink, PersistReport};
pub use state::{FailureOutcome, GenerationState, PauseReason, Phase, PhaseKind, Skip, Trigger};
pub use store::{SqliteDirectory, SqliteSink};
