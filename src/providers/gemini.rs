use crate::{
    error::ClassifierError,
    models::{GeminiContent, GeminiGenerationConfig, GeminiRequest, GeminiResponse},
    provider::{InvokeParams, LlmProvider},
};
use async_trait::async_trait;
use reqwest::Client;

use super::http::post_json;

const GENERATE_CONTENT: &str = ":generateContent";

/// Provider for Google Gemini `models/{model}:generateContent`
///
/// `api_url` may be the full method URL or the API base
/// (e.g. `https://generativelanguage.googleapis.com/v1beta`), in which case
/// the model path is appended per request.
pub struct GeminiProvider {
    client: Client,
    api_url: String,
}

impl GeminiProvider {
    pub fn new(api_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        if self.api_url.contains(GENERATE_CONTENT) {
            self.api_url.clone()
        } else {
            format!(
                "{}/models/{model}{GENERATE_CONTENT}",
                self.api_url.trim_end_matches('/')
            )
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn invoke(&self, params: InvokeParams<'_>) -> Result<String, ClassifierError> {
        let request = GeminiRequest {
            system_instruction: GeminiContent::text(None, params.system_prompt),
            contents: vec![GeminiContent::text(Some("user"), params.user_prompt)],
            generation_config: GeminiGenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
                seed: params.seed,
                response_mime_type: params
                    .json_output
                    .then(|| "application/json".to_string()),
            },
        };

        let endpoint = self.endpoint(params.model);
        log::debug!("Gemini endpoint: {endpoint}");

        let auth = params.api_key.map(|key| ("x-goog-api-key", key.to_string()));
        let gemini_response: GeminiResponse =
            post_json(&self.client, &endpoint, &request, auth, params.timeout_secs).await?;

        gemini_response
            .candidates
            .first()
            .map(|c| c.content.joined_text())
            .ok_or_else(|| {
                ClassifierError::InvalidResponse("No candidates in response".to_string())
            })
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_base_url() {
        let provider =
            GeminiProvider::new("https://generativelanguage.googleapis.com/v1beta/".to_string());
        assert_eq!(
            provider.endpoint("gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_endpoint_used_verbatim_when_complete() {
        let url = "http://localhost:9000/v1beta/models/custom:generateContent";
        let provider = GeminiProvider::new(url.to_string());
        assert_eq!(provider.endpoint("ignored"), url);
        assert_eq!(provider.name(), "Gemini");
    }
}
