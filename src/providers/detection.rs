use crate::provider::{LlmProvider, ProviderType};

use super::{gemini::GeminiProvider, ollama::OllamaProvider, openai::OpenAIProvider};

/// Detect API format from URL
///
/// # Detection Strategy
///
/// 1. **Path/host-based detection** (highest priority):
///    - `:generateContent` or `generativelanguage.googleapis.com` → Gemini
///    - `/api/generate` → Ollama
///    - `/v1/chat/completions` → OpenAI
///
/// 2. **Port-based detection** (fallback):
///    - Port 11434 → Ollama (common local server port)
///
/// 3. **Default**: OpenAI
///
/// # Examples
///
/// ```
/// use experience_classifier::{detect_provider_type, ProviderType};
///
/// assert!(matches!(
///     detect_provider_type("https://generativelanguage.googleapis.com/v1beta"),
///     ProviderType::Gemini
/// ));
///
/// assert!(matches!(
///     detect_provider_type("http://localhost:11434/api/generate"),
///     ProviderType::Ollama
/// ));
///
/// assert!(matches!(
///     detect_provider_type("https://api.example.com"),
///     ProviderType::OpenAI
/// ));
/// ```
pub fn detect_provider_type(url: &str) -> ProviderType {
    if url.contains(":generateContent") || url.contains("generativelanguage.googleapis.com") {
        return ProviderType::Gemini;
    }
    if url.contains("/api/generate") {
        return ProviderType::Ollama;
    }
    if url.contains("/v1/chat/completions") {
        return ProviderType::OpenAI;
    }

    if url.contains("localhost:11434") || url.contains("127.0.0.1:11434") {
        return ProviderType::Ollama;
    }

    ProviderType::OpenAI
}

/// Create provider instance based on URL and optional explicit type
///
/// An explicit `provider_type` wins; otherwise the type is detected from the URL.
pub fn create_provider(
    api_url: String,
    provider_type: Option<ProviderType>,
) -> Box<dyn LlmProvider> {
    let provider = provider_type.unwrap_or_else(|| detect_provider_type(&api_url));

    match provider {
        ProviderType::Ollama => Box::new(OllamaProvider::new(api_url)),
        ProviderType::OpenAI => Box::new(OpenAIProvider::new(api_url)),
        ProviderType::Gemini => Box::new(GeminiProvider::new(api_url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_gemini_by_host() {
        let url = "https://generativelanguage.googleapis.com/v1beta";
        assert_eq!(detect_provider_type(url), ProviderType::Gemini);
    }

    #[test]
    fn test_detect_gemini_by_method() {
        let url = "http://127.0.0.1:8080/v1beta/models/gemini-1.5-flash:generateContent";
        assert_eq!(detect_provider_type(url), ProviderType::Gemini);
    }

    #[test]
    fn test_detect_ollama_by_path() {
        let url = "http://localhost:11434/api/generate";
        assert_eq!(detect_provider_type(url), ProviderType::Ollama);
    }

    #[test]
    fn test_detect_ollama_by_port() {
        assert_eq!(
            detect_provider_type("http://127.0.0.1:11434"),
            ProviderType::Ollama
        );
    }

    #[test]
    fn test_path_overrides_port() {
        let url = "http://localhost:11434/v1/chat/completions";
        assert_eq!(detect_provider_type(url), ProviderType::OpenAI);
    }

    #[test]
    fn test_create_provider_explicit_type() {
        let provider = create_provider(
            "http://localhost:8080/custom".to_string(),
            Some(ProviderType::Gemini),
        );
        assert_eq!(provider.name(), "Gemini");
    }

    #[test]
    fn test_create_provider_auto_detect() {
        let provider = create_provider("http://localhost:11434/api/generate".to_string(), None);
        assert_eq!(provider.name(), "Ollama");
    }
}
