//! Shared constants

pub mod ai {
    /// Default provider model when none is configured
    pub const DEFAULT_MODEL: &str = "deepseek-chat";

    /// Output budget for a multi-agent ensemble request
    pub const ENSEMBLE_MAX_TOKENS: usize = 2000;

    /// Output budget for a single agent's turn
    pub const TURN_MAX_TOKENS: usize = 1000;

    /// Sampling temperature used for every generation request
    pub const TEMPERATURE: f32 = 0.8;

    /// Prompt sent on every autonomous cycle
    pub const CONTINUE_PROMPT: &str = "Continue the story";

    /// Number of recent lines handed to a turn-mode request as context
    pub const TURN_CONTEXT_LINES: usize = 20;
}

pub mod generation {
    /// Minimum spacing between two generation requests for one group (ms)
    pub const MIN_REQUEST_INTERVAL_MS: u64 = 15_000;

    /// First retry delay (ms)
    pub const BASE_RETRY_DELAY_MS: u64 = 5_000;

    /// Retry delay ceiling (ms)
    pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

    /// Consecutive retries before a scheduler pauses itself
    pub const MAX_RETRIES: u32 = 5;

    /// Buffered commands per scheduler actor
    pub const COMMAND_BUFFER: usize = 32;
}

pub mod realtime {
    /// Broadcast buffer per group before slow subscribers start lagging
    pub const GROUP_CHANNEL_CAPACITY: usize = 256;
}

pub mod storage {
    pub const CONFIG_DIR_NAME: &str = ".worldchat";
    pub const DATABASE_FILE_NAME: &str = "worldchat.db";
    pub const DEFAULT_AGENT_NAME: &str = "Unnamed agent";
    pub const DEFAULT_AGENT_DESCRIPTION: &str = "An emotional agent";
}
