use crate::error::ClassifierError;
use async_trait::async_trait;
use std::fmt;

/// Parameters for one LLM invocation
///
/// Consolidated so `invoke()` keeps a single argument as providers grow.
///
/// # Example
///
/// ```ignore
/// let params = InvokeParams {
///     model: "gemini-1.5-flash",
///     system_prompt: "You classify survey responses.",
///     user_prompt: "Please classify these 3 responses...",
///     temperature: 0.0,
///     max_tokens: Some(8192),
///     seed: None,
///     api_key: Some("..."),
///     timeout_secs: 120,
///     json_output: true,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct InvokeParams<'a> {
    /// Model name/identifier
    pub model: &'a str,

    /// Instructions, taxonomy reference and output format
    pub system_prompt: &'a str,

    /// The batch of responses to classify
    pub user_prompt: &'a str,

    /// Sampling temperature (0.0 = as deterministic as the model allows)
    pub temperature: f32,

    /// Maximum tokens to generate (None = provider default)
    pub max_tokens: Option<u32>,

    pub seed: Option<u64>,

    pub api_key: Option<&'a str>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Ask the provider to constrain output to JSON where it supports it
    pub json_output: bool,
}

/// LLM provider trait
///
/// Implementations translate [`InvokeParams`] into one HTTP request and
/// return the model's text. They never retry.
///
/// - `OpenAIProvider` - OpenAI-compatible chat completions
/// - `OllamaProvider` - Ollama /api/generate
/// - `GeminiProvider` - Google Gemini generateContent
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Invoke the LLM and return the raw model text
    async fn invoke(&self, params: InvokeParams<'_>) -> Result<String, ClassifierError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// API formats understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// Ollama /api/generate format (local servers)
    Ollama,
    /// OpenAI-compatible /v1/chat/completions format
    OpenAI,
    /// Google Gemini generateContent format
    Gemini,
}

impl ProviderType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAI),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Hosted APIs need a credential; local Ollama servers do not
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
        })
    }
}
