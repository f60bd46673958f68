// Integration tests for the config file override pattern
//
// Priority: CLI arg > config file > hardcoded default

use experience_classifier::{
    config_builder::ConfigBuilder, load_config_file, ClassifierError, Provider, ResponseShape,
    UnrecognizedLabelPolicy,
};
use std::fs;
use tempfile::TempDir;

const TAXONOMY: &str = "\
types: [إيجابي, سلبي, محايد]
categories:
  التدريس:
    subcategories: [جودة الشرح, تعامل الأساتذة]
  المرافق: [القاعات, المكتبة]
";

fn setup(config_name: &str, config_body: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let taxonomy_path = dir.path().join("classes.yaml");
    fs::write(&taxonomy_path, TAXONOMY).unwrap();

    let body = config_body.replace("{taxonomy}", &taxonomy_path.display().to_string());
    let config_path = dir.path().join(config_name);
    fs::write(&config_path, body).unwrap();
    (dir, config_path)
}

#[test]
fn test_toml_file_builds_complete_config() {
    let (_dir, path) = setup(
        "config.toml",
        r#"
api_url = "https://generativelanguage.googleapis.com/v1beta"
model = "gemini-1.5-flash"
api_key = "file-key"
taxonomy_file = "{taxonomy}"
temperature = 0.3
seed = 42
on_unrecognized_label = "tag_error"
response_shape = "paired"

[batching]
min_batch_size = 5
max_batch_size = 15
"#,
    );

    let file = load_config_file(&path).unwrap();
    let config = ConfigBuilder::new()
        .merge_file_config(&file)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.model, "gemini-1.5-flash");
    assert_eq!(config.api_key.as_deref(), Some("file-key"));
    assert_eq!(config.temperature, 0.3);
    assert_eq!(config.seed, Some(42));
    assert_eq!(config.on_unrecognized_label, UnrecognizedLabelPolicy::TagError);
    assert_eq!(config.response_shape, ResponseShape::Paired);
    assert_eq!(config.batching.min_batch_size, 5);
    assert_eq!(config.batching.max_batch_size, 15);
    assert_eq!(config.taxonomy.categories.len(), 2);
    assert_eq!(
        config.taxonomy.categories["التدريس"],
        vec!["جودة الشرح".to_string(), "تعامل الأساتذة".to_string()]
    );
}

#[test]
fn test_cli_values_override_file() {
    let (_dir, path) = setup(
        "config.json",
        r#"{
            "api_url": "http://localhost:11434/api/generate",
            "model": "llama3",
            "taxonomy_file": "{taxonomy}",
            "temperature": 0.7,
            "timeout_secs": 60
        }"#,
    );

    let file = load_config_file(&path).unwrap();
    let config = ConfigBuilder::new()
        .model("qwen2.5")
        .temperature(0.0)
        .merge_file_config(&file)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.model, "qwen2.5");
    assert_eq!(config.temperature, 0.0);
    // Not given on the command line: file value wins over the default
    assert_eq!(config.timeout_secs, 60);
    assert_eq!(config.api_url, "http://localhost:11434/api/generate");
}

#[test]
fn test_file_provider_parsed() {
    let (_dir, path) = setup(
        "config.json",
        r#"{
            "api_url": "http://gateway.local/llm",
            "model": "llama3",
            "provider": "ollama",
            "taxonomy_file": "{taxonomy}"
        }"#,
    );

    let file = load_config_file(&path).unwrap();
    let config = ConfigBuilder::new()
        .merge_file_config(&file)
        .unwrap()
        .build()
        .unwrap();

    // Explicit ollama: no key needed even though the URL looks generic
    assert_eq!(config.provider, Some(Provider::Ollama));
    assert!(config.api_key.is_none());
}

#[test]
fn test_unknown_provider_in_file_is_rejected() {
    let (_dir, path) = setup(
        "config.json",
        r#"{"model": "x", "provider": "anthropic", "taxonomy_file": "{taxonomy}"}"#,
    );

    let file = load_config_file(&path).unwrap();
    let err = ConfigBuilder::new().merge_file_config(&file).err().unwrap();
    assert!(matches!(err, ClassifierError::InvalidArguments(_)));
    assert!(err.to_string().contains("anthropic"));
}

#[test]
fn test_hosted_endpoint_without_key_is_configuration_error() {
    let (_dir, path) = setup(
        "config.toml",
        r#"
api_url = "https://api.openai.com/v1/chat/completions"
model = "gpt-4o-mini"
taxonomy_file = "{taxonomy}"
"#,
    );

    let file = load_config_file(&path).unwrap();
    let err = ConfigBuilder::new()
        .merge_file_config(&file)
        .unwrap()
        .build()
        .unwrap_err();

    assert_eq!(err.code(), "CONFIGURATION_ERROR");
    assert!(err.to_string().contains("openai"));
}

#[test]
fn test_invalid_batching_table_rejected_on_load() {
    let (_dir, path) = setup(
        "config.toml",
        r#"
model = "llama3"

[batching]
min_batch_size = 50
max_batch_size = 10
"#,
    );

    let err = load_config_file(&path).unwrap_err();
    assert!(matches!(err, ClassifierError::Configuration(_)));
}

#[test]
fn test_empty_taxonomy_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let taxonomy_path = dir.path().join("empty.yaml");
    fs::write(&taxonomy_path, "types: [positive]\ncategories: {}\n").unwrap();

    let err = ConfigBuilder::new()
        .api_url("http://localhost:11434/api/generate")
        .model("llama3")
        .taxonomy_file(taxonomy_path)
        .build()
        .unwrap_err();

    assert!(err.to_string().contains("no categories"));
}
