use crate::{error::ClassifierError, planner::BatchingConfig};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Configuration file request format (supports both JSON and TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFileRequest {
    /// LLM API endpoint URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model name/identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider type ("ollama", "openai" or "gemini"; auto-detected if not specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// API key for authentication (conflicts with api_key_name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name containing the API key (conflicts with api_key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_name: Option<String>,

    /// Category taxonomy (YAML)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_file: Option<String>,

    /// Sampling temperature (default: 0.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum response tokens (default: None = model's maximum)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Random seed for reproducible sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Per-request timeout in seconds (default: 120)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Ask the provider for JSON-only output (default: true)
    #[serde(default = "default_json_output")]
    pub json_output: bool,

    /// "drop", "default_neutral" or "tag_error"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_unrecognized_label: Option<String>,

    /// "flat" or "paired"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_shape: Option<String>,

    /// Batch sizing tunables (`[batching]` table)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batching: Option<BatchingConfig>,
}

impl Default for ConfigFileRequest {
    fn default() -> Self {
        Self {
            api_url: None,
            model: None,
            provider: None,
            api_key: None,
            api_key_name: None,
            taxonomy_file: None,
            temperature: default_temperature(),
            max_tokens: None,
            seed: None,
            timeout_secs: default_timeout(),
            json_output: default_json_output(),
            on_unrecognized_label: None,
            response_shape: None,
            batching: None,
        }
    }
}

fn default_temperature() -> f32 {
    crate::constants::llm_defaults::DEFAULT_TEMPERATURE
}

fn default_timeout() -> u64 {
    crate::constants::llm_defaults::DEFAULT_TIMEOUT_SECS
}

fn default_json_output() -> bool {
    true
}

impl ConfigFileRequest {
    /// Reject combinations that cannot be resolved
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.api_key.is_some() && self.api_key_name.is_some() {
            return Err(ClassifierError::InvalidArguments(
                "Config file cannot specify both 'api_key' and 'api_key_name'".to_string(),
            ));
        }

        if let Some(path) = &self.taxonomy_file {
            if !Path::new(path).exists() {
                return Err(ClassifierError::FileNotFound(format!(
                    "Taxonomy file '{path}' referenced by config file does not exist"
                )));
            }
        }

        if let Some(batching) = &self.batching {
            batching.validate()?;
        }

        Ok(())
    }
}

/// Load config from file (auto-detects JSON vs TOML from extension)
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<ConfigFileRequest, ClassifierError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        ClassifierError::FileNotFound(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;

    let config: ConfigFileRequest = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&contents).map_err(|e| {
            ClassifierError::InvalidArguments(format!("Failed to parse TOML config: {e}"))
        })?,
        Some("json") => serde_json::from_str(&contents).map_err(|e| {
            ClassifierError::InvalidArguments(format!("Failed to parse JSON config: {e}"))
        })?,
        _ => {
            return Err(ClassifierError::InvalidArguments(
                "Config file must have .json or .toml extension".to_string(),
            ))
        }
    };

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_json_config() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.json",
            r#"{
                "api_url": "https://generativelanguage.googleapis.com/v1beta",
                "model": "gemini-1.5-flash",
                "temperature": 0.2,
                "max_tokens": 4096,
                "response_shape": "paired"
            }"#,
        );

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, Some(4096));
        assert_eq!(config.response_shape.as_deref(), Some("paired"));
    }

    #[test]
    fn test_load_toml_config_with_batching_table() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.toml",
            r#"
                api_url = "http://localhost:11434/api/generate"
                model = "qwen2.5"
                on_unrecognized_label = "tag_error"

                [batching]
                min_batch_size = 5
                max_batch_size = 30
            "#,
        );

        let config = load_config_file(&path).unwrap();
        let batching = config.batching.unwrap();
        assert_eq!(batching.min_batch_size, 5);
        assert_eq!(batching.max_batch_size, 30);
        // Unset keys keep their defaults
        assert_eq!(batching.max_tokens_per_batch, 4000);
        assert_eq!(config.on_unrecognized_label.as_deref(), Some("tag_error"));
    }

    #[test]
    fn test_default_values() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", r#"{"model": "llama3"}"#);

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.timeout_secs, 120);
        assert!(config.json_output);
        assert!(config.max_tokens.is_none());
        assert!(config.batching.is_none());
    }

    #[test]
    fn test_invalid_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.txt", "model = 'x'");

        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("must have .json or .toml extension"));
    }

    #[test]
    fn test_conflicting_api_key_fields() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.json",
            r#"{"api_key": "k", "api_key_name": "GEMINI_API_KEY"}"#,
        );

        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("both 'api_key' and 'api_key_name'"));
    }

    #[test]
    fn test_missing_taxonomy_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.json",
            r#"{"taxonomy_file": "/nonexistent/classes.yaml"}"#,
        );

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_batching_bounds() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.toml",
            "[batching]\nmin_batch_size = 20\nmax_batch_size = 10\n",
        );

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::Configuration(_)));
    }
}
