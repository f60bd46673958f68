use crate::{
    error::ClassifierError,
    models::{OllamaOptions, OllamaRequest, OllamaResponse},
    provider::{InvokeParams, LlmProvider},
};
use async_trait::async_trait;
use reqwest::Client;

use super::http::post_json;

/// Local Ollama server, `/api/generate` without streaming
pub struct OllamaProvider {
    client: Client,
    api_url: String,
}

impl OllamaProvider {
    pub fn new(api_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
        }
    }
}

fn generate_request(params: &InvokeParams<'_>) -> OllamaRequest {
    OllamaRequest {
        model: params.model.to_string(),
        system: params.system_prompt.to_string(),
        prompt: params.user_prompt.to_string(),
        stream: false,
        format: params.json_output.then(|| "json".to_string()),
        options: OllamaOptions {
            temperature: params.temperature,
            num_predict: params.max_tokens,
            seed: params.seed,
        },
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn invoke(&self, params: InvokeParams<'_>) -> Result<String, ClassifierError> {
        // Local servers take no API key
        let response: OllamaResponse = post_json(
            &self.client,
            &self.api_url,
            &generate_request(&params),
            None,
            params.timeout_secs,
        )
        .await?;
        Ok(response.response)
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
