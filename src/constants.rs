//! Process-wide defaults
//!
//! Grouped by concern. Every batching value here is only a default: the
//! effective values live in [`crate::BatchingConfig`] and are fixed once a
//! run starts.

/// Defaults for the remote model invocation
pub mod llm_defaults {
    /// Classification should be as repeatable as the model allows
    pub const DEFAULT_TEMPERATURE: f32 = 0.0;
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 2.0;

    /// Per-call timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Maximum output tokens requested from the model
    pub const DEFAULT_MAX_TOKENS: u32 = 8192;
}

/// Defaults for batch sizing and adaptive control
pub mod batching {
    /// Below this many items everything is sent in one request
    pub const MIN_BATCH_SIZE: usize = 10;
    pub const MAX_BATCH_SIZE: usize = 20;

    /// Token budget for a single classification request (prompt + responses)
    pub const MAX_TOKENS_PER_BATCH: usize = 4000;

    /// Tokens reserved for instructions and taxonomy reference
    pub const PROMPT_TEMPLATE_TOKENS: usize = 600;

    /// Approximate tokens per character of response text
    pub const TOKENS_PER_CHAR: f64 = 0.5;

    /// Multiplier applied after a fully successful window
    pub const GROWTH_FACTOR: f64 = 1.2;

    /// Multiplier applied after a failed or oversized window
    pub const SHRINK_FACTOR: f64 = 0.75;

    /// Consecutive failures after which the batch size drops straight to the minimum
    pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
}

/// Prompt layout
pub mod prompt {
    /// Separator placed between responses inside one request
    pub const RESPONSE_SEPARATOR: &str = "\n=====\n";

    /// Default separator used to split a plain-text responses file
    pub const DEFAULT_INPUT_SEPARATOR: &str = "\n";
}
