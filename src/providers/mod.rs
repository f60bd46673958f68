mod detection;
mod gemini;
mod http;
mod logging;
mod ollama;
mod openai;

pub use detection::{create_provider, detect_provider_type};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
