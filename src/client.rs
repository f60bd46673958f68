use crate::{
    error::ClassifierError,
    provider::{InvokeParams, LlmProvider},
    providers::create_provider,
};

pub use crate::provider::ProviderType as Provider;

/// Thin wrapper selecting the provider implementation for an endpoint
pub struct LlmClient {
    provider: Box<dyn LlmProvider>,
}

impl LlmClient {
    pub fn new(api_url: String, provider: Option<Provider>) -> Self {
        Self {
            provider: create_provider(api_url, provider),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Invoke the LLM
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use experience_classifier::{LlmClient, InvokeParams};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = LlmClient::new("http://localhost:11434/api/generate".to_string(), None);
    ///
    /// let params = InvokeParams {
    ///     model: "llama3",
    ///     system_prompt: "You classify survey responses.",
    ///     user_prompt: "Please classify these 1 responses...",
    ///     temperature: 0.0,
    ///     max_tokens: None,
    ///     seed: None,
    ///     api_key: None,
    ///     timeout_secs: 30,
    ///     json_output: true,
    /// };
    ///
    /// let raw = client.invoke(params).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn invoke(&self, params: InvokeParams<'_>) -> Result<String, ClassifierError> {
        self.provider.invoke(params).await
    }
}
