//! Configuration builder for merging CLI args with config files
//!
//! CLI arguments take precedence over config file values, which take
//! precedence over defaults. Validation happens once, in [`ConfigBuilder::build`].

use crate::{
    config::ConfigFileRequest, constants::llm_defaults, detect_provider_type,
    error::ClassifierError, planner::BatchingConfig, prompt::ResponseShape,
    reconciler::UnrecognizedLabelPolicy, taxonomy::Taxonomy, Provider, RunConfig,
};
use std::path::PathBuf;

const MIN_TOKENS: u32 = 1;
const MIN_TIMEOUT: u64 = 1;

/// Builder for [`RunConfig`]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    // Required (CLI or config file)
    pub api_url: Option<String>,
    pub model: Option<String>,

    // Optional (CLI > config > default)
    pub provider: Option<Provider>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub seed: Option<u64>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub json_output: Option<bool>,
    pub on_unrecognized_label: Option<UnrecognizedLabelPolicy>,
    pub response_shape: Option<ResponseShape>,

    // Taxonomy: either already loaded or a file to load
    pub taxonomy: Option<Taxonomy>,
    pub taxonomy_file: Option<PathBuf>,

    // Batching, per field so CLI flags can override single keys of a [batching] table
    pub min_batch_size: Option<usize>,
    pub max_batch_size: Option<usize>,
    pub max_tokens_per_batch: Option<usize>,
    pub prompt_template_tokens: Option<usize>,
    pub tokens_per_char: Option<f64>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge values from a config file (lower priority than CLI args)
    ///
    /// Unknown provider, policy or shape strings are rejected here rather than
    /// silently ignored.
    pub fn merge_file_config(
        mut self,
        file_config: &ConfigFileRequest,
    ) -> Result<Self, ClassifierError> {
        if self.api_url.is_none() {
            self.api_url = file_config.api_url.clone();
        }
        if self.model.is_none() {
            self.model = file_config.model.clone();
        }
        if self.provider.is_none() {
            if let Some(provider_str) = &file_config.provider {
                self.provider = Some(Provider::parse(provider_str).ok_or_else(|| {
                    ClassifierError::InvalidArguments(format!(
                        "Unknown provider '{provider_str}' in config file. \
                         Valid values: 'ollama', 'openai', 'gemini'"
                    ))
                })?);
            }
        }
        if self.temperature.is_none() {
            self.temperature = Some(file_config.temperature);
        }
        if self.max_tokens.is_none() {
            self.max_tokens = file_config.max_tokens;
        }
        if self.seed.is_none() {
            self.seed = file_config.seed;
        }
        if self.timeout_secs.is_none() {
            self.timeout_secs = Some(file_config.timeout_secs);
        }
        if self.json_output.is_none() {
            self.json_output = Some(file_config.json_output);
        }
        if self.api_key.is_none() {
            self.api_key = file_config.api_key.clone();
        }
        if self.taxonomy_file.is_none() && self.taxonomy.is_none() {
            self.taxonomy_file = file_config.taxonomy_file.as_ref().map(PathBuf::from);
        }
        if self.on_unrecognized_label.is_none() {
            if let Some(policy) = &file_config.on_unrecognized_label {
                self.on_unrecognized_label =
                    Some(UnrecognizedLabelPolicy::parse(policy).ok_or_else(|| {
                        ClassifierError::InvalidArguments(format!(
                            "Unknown on_unrecognized_label '{policy}' in config file. \
                             Valid values: 'drop', 'default_neutral', 'tag_error'"
                        ))
                    })?);
            }
        }
        if self.response_shape.is_none() {
            if let Some(shape) = &file_config.response_shape {
                self.response_shape = Some(ResponseShape::parse(shape).ok_or_else(|| {
                    ClassifierError::InvalidArguments(format!(
                        "Unknown response_shape '{shape}' in config file. \
                         Valid values: 'flat', 'paired'"
                    ))
                })?);
            }
        }
        if let Some(batching) = &file_config.batching {
            self.min_batch_size = self.min_batch_size.or(Some(batching.min_batch_size));
            self.max_batch_size = self.max_batch_size.or(Some(batching.max_batch_size));
            self.max_tokens_per_batch = self
                .max_tokens_per_batch
                .or(Some(batching.max_tokens_per_batch));
            self.prompt_template_tokens = self
                .prompt_template_tokens
                .or(Some(batching.prompt_template_tokens));
            self.tokens_per_char = self.tokens_per_char.or(Some(batching.tokens_per_char));
        }

        Ok(self)
    }

    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn json_output(mut self, json_output: bool) -> Self {
        self.json_output = Some(json_output);
        self
    }

    pub fn on_unrecognized_label(mut self, policy: UnrecognizedLabelPolicy) -> Self {
        self.on_unrecognized_label = Some(policy);
        self
    }

    pub fn response_shape(mut self, shape: ResponseShape) -> Self {
        self.response_shape = Some(shape);
        self
    }

    /// Use an already loaded taxonomy (takes precedence over a taxonomy file)
    pub fn taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    pub fn taxonomy_file(mut self, path: PathBuf) -> Self {
        self.taxonomy_file = Some(path);
        self
    }

    pub fn min_batch_size(mut self, size: usize) -> Self {
        self.min_batch_size = Some(size);
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    pub fn max_tokens_per_batch(mut self, tokens: usize) -> Self {
        self.max_tokens_per_batch = Some(tokens);
        self
    }

    /// Build the final [`RunConfig`], applying defaults and validation
    ///
    /// # Errors
    ///
    /// - `InvalidArguments` if api_url or model is missing or a value is out of range
    /// - `Configuration` if a hosted provider has no API key, the taxonomy is
    ///   missing or unreadable, or the batching bounds are inconsistent
    pub fn build(self) -> Result<RunConfig, ClassifierError> {
        let api_url = self.api_url.ok_or_else(|| {
            ClassifierError::InvalidArguments(
                "API URL must be provided via --api-url or in config file (--config-file)"
                    .to_string(),
            )
        })?;

        let model = self.model.ok_or_else(|| {
            ClassifierError::InvalidArguments(
                "Model must be provided via --model or in config file (--config-file)".to_string(),
            )
        })?;

        let temperature = self
            .temperature
            .unwrap_or(llm_defaults::DEFAULT_TEMPERATURE);
        if !(llm_defaults::MIN_TEMPERATURE..=llm_defaults::MAX_TEMPERATURE).contains(&temperature) {
            return Err(ClassifierError::InvalidArguments(format!(
                "temperature must be between {} and {}, got {temperature}",
                llm_defaults::MIN_TEMPERATURE,
                llm_defaults::MAX_TEMPERATURE
            )));
        }

        let max_tokens = self.max_tokens.unwrap_or(llm_defaults::DEFAULT_MAX_TOKENS);
        if max_tokens < MIN_TOKENS {
            return Err(ClassifierError::InvalidArguments(format!(
                "max_tokens must be >= {MIN_TOKENS}, got {max_tokens}"
            )));
        }

        let timeout_secs = self
            .timeout_secs
            .unwrap_or(llm_defaults::DEFAULT_TIMEOUT_SECS);
        if timeout_secs < MIN_TIMEOUT {
            return Err(ClassifierError::InvalidArguments(format!(
                "timeout_secs must be >= {MIN_TIMEOUT}, got {timeout_secs}"
            )));
        }

        let resolved_provider = self
            .provider
            .unwrap_or_else(|| detect_provider_type(&api_url));
        if resolved_provider.requires_api_key() && self.api_key.is_none() {
            return Err(ClassifierError::Configuration(format!(
                "An API key is required for the {resolved_provider} endpoint \
                 (use --api-key, --api-key-name, or 'api_key_name' in the config file)"
            )));
        }

        let defaults = BatchingConfig::default();
        let batching = BatchingConfig {
            min_batch_size: self.min_batch_size.unwrap_or(defaults.min_batch_size),
            max_batch_size: self.max_batch_size.unwrap_or(defaults.max_batch_size),
            max_tokens_per_batch: self
                .max_tokens_per_batch
                .unwrap_or(defaults.max_tokens_per_batch),
            prompt_template_tokens: self
                .prompt_template_tokens
                .unwrap_or(defaults.prompt_template_tokens),
            tokens_per_char: self.tokens_per_char.unwrap_or(defaults.tokens_per_char),
        };
        batching.validate()?;

        let taxonomy = match (self.taxonomy, &self.taxonomy_file) {
            (Some(taxonomy), _) => taxonomy,
            (None, Some(path)) => Taxonomy::load(path)?,
            (None, None) => {
                return Err(ClassifierError::Configuration(
                    "A taxonomy must be provided via --taxonomy-file or 'taxonomy_file' in the config file"
                        .to_string(),
                ))
            }
        };

        Ok(RunConfig {
            api_url,
            model,
            provider: self.provider,
            api_key: self.api_key,
            temperature,
            max_tokens: Some(max_tokens),
            seed: self.seed,
            timeout_secs,
            taxonomy,
            taxonomy_file: self.taxonomy_file,
            batching,
            on_unrecognized_label: self.on_unrecognized_label.unwrap_or_default(),
            response_shape: self.response_shape.unwrap_or_default(),
            json_output: self.json_output.unwrap_or(true),
        })
    }
}
