//! Classification client: one prompt and one remote call per batch

use crate::{
    client::LlmClient,
    error::ClassifierError,
    prompt::PromptBuilder,
    provider::InvokeParams,
    RunConfig,
};
use async_trait::async_trait;

/// Sends a batch of responses to a model and returns its raw text
///
/// The returned text is untrusted: it goes through the reconciler before any
/// of it is used. Implementations must not retry; the batch controller owns
/// all recovery.
#[async_trait]
pub trait BatchClassifier: Send + Sync {
    async fn classify(&self, batch: &[String]) -> Result<String, ClassifierError>;
}

/// [`BatchClassifier`] backed by a remote LLM
pub struct LlmClassifier {
    client: LlmClient,
    prompts: PromptBuilder,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    seed: Option<u64>,
    timeout_secs: u64,
    json_output: bool,
}

impl LlmClassifier {
    pub fn from_config(config: &RunConfig) -> Self {
        let client = LlmClient::new(config.api_url.clone(), config.provider);
        log::debug!(
            "Classification client using {} provider at {}",
            client.provider_name(),
            config.api_url
        );
        Self {
            client,
            prompts: PromptBuilder::new(&config.taxonomy, config.response_shape),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            seed: config.seed,
            timeout_secs: config.timeout_secs,
            json_output: config.json_output,
        }
    }
}

#[async_trait]
impl BatchClassifier for LlmClassifier {
    async fn classify(&self, batch: &[String]) -> Result<String, ClassifierError> {
        let prompt = self.prompts.build(batch);
        log::debug!(
            "Sending batch of {} responses ({} prompt chars)",
            batch.len(),
            prompt.system.chars().count() + prompt.user.chars().count()
        );

        self.client
            .invoke(InvokeParams {
                model: &self.model,
                system_prompt: &prompt.system,
                user_prompt: &prompt.user,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                seed: self.seed,
                api_key: self.api_key.as_deref(),
                timeout_secs: self.timeout_secs,
                json_output: self.json_output,
            })
            .await
    }
}
