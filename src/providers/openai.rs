use crate::{
    error::ClassifierError,
    models::{Message, OpenAIRequest, OpenAIResponse},
    provider::{InvokeParams, LlmProvider},
};
use async_trait::async_trait;
use reqwest::Client;

use super::http::post_json;

/// OpenAI-compatible `/v1/chat/completions`
pub struct OpenAIProvider {
    client: Client,
    api_url: String,
}

impl OpenAIProvider {
    pub fn new(api_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
        }
    }
}

fn message(role: &str, content: &str) -> Message {
    Message {
        role: role.to_string(),
        content: content.to_string(),
    }
}

/// Chat request with the instructions as the system turn and the batch as the user turn
///
/// `json_output` is not forwarded: `json_object` mode forces a top-level
/// object, while classifications come back as an array.
fn chat_request(params: &InvokeParams<'_>) -> OpenAIRequest {
    OpenAIRequest {
        model: params.model.to_string(),
        messages: vec![
            message("system", params.system_prompt),
            message("user", params.user_prompt),
        ],
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        seed: params.seed,
    }
}

fn first_choice(response: OpenAIResponse) -> Result<String, ClassifierError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| ClassifierError::InvalidResponse("No choices in response".to_string()))
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn invoke(&self, params: InvokeParams<'_>) -> Result<String, ClassifierError> {
        let auth = params
            .api_key
            .map(|key| ("Authorization", format!("Bearer {key}")));
        let response = post_json(
            &self.client,
            &self.api_url,
            &chat_request(&params),
            auth,
            params.timeout_secs,
        )
        .await?;
        first_choice(response)
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_omits_json_mode() {
        let params = InvokeParams {
            model: "gpt-4o-mini",
            system_prompt: "صنف الردود",
            user_prompt: "Response 1: الشرح ممتاز",
            temperature: 0.0,
            max_tokens: None,
            seed: Some(7),
            api_key: Some("sk-test"),
            timeout_secs: 30,
            json_output: true,
        };

        let body = serde_json::to_value(chat_request(&params)).unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Response 1: الشرح ممتاز");
        assert!(body.get("response_format").is_none());
        assert!(body.get("max_tokens").is_none());
        assert!(!body.to_string().contains("sk-test"));
    }

    #[test]
    fn test_empty_choices_is_invalid_response() {
        let err = first_choice(OpenAIResponse { choices: vec![] }).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidResponse(_)));
    }
}
