//! Survey response classification library
//!
//! Classifies free-text responses into category / subcategory / sentiment
//! labels with a remote LLM, sizing batches adaptively and reconciling
//! whatever the model returns back onto the input responses.

mod classifier;
mod client;
pub mod config;
pub mod config_builder;
pub mod constants;
mod controller;
mod error;
mod models;
mod output;
mod planner;
mod prompt;
mod provider;
pub mod providers;
mod reconciler;
mod taxonomy;
mod token_estimator;

pub use classifier::{BatchClassifier, LlmClassifier};
pub use client::{LlmClient, Provider};
pub use config::{load_config_file, ConfigFileRequest};
pub use controller::{
    BatchController, BatchOutcome, ClassificationRun, ClassifiedResult, ControllerState, RunStats,
};
pub use error::ClassifierError;
pub use models::*;
pub use output::{ClassificationReport, ErrorInfo, ExportRecord, Metadata, Summary};
pub use planner::{BatchPlan, BatchPlanner, BatchingConfig};
pub use prompt::{ClassificationPrompt, PromptBuilder, ResponseShape};
pub use provider::{InvokeParams, LlmProvider, ProviderType};
pub use providers::{
    create_provider, detect_provider_type, GeminiProvider, OllamaProvider, OpenAIProvider,
};
pub use reconciler::{
    Classification, ParseStage, ReconcileIssue, Reconciler, Reconciliation, Sentiment,
    UnrecognizedLabelPolicy,
};
pub use taxonomy::Taxonomy;
pub use token_estimator::TokenEstimator;

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

/// Fully resolved configuration for one classification run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_url: String,
    pub model: String,
    pub provider: Option<Provider>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub seed: Option<u64>,
    pub timeout_secs: u64,
    pub taxonomy: Taxonomy,
    // Source tracking for metadata
    pub taxonomy_file: Option<PathBuf>,
    pub batching: BatchingConfig,
    pub on_unrecognized_label: UnrecognizedLabelPolicy,
    pub response_shape: ResponseShape,
    /// Ask the provider for JSON-only output where it supports it
    pub json_output: bool,
}

fn create_metadata(config: &RunConfig, latency_ms: u64) -> Metadata {
    Metadata {
        model: config.model.clone(),
        api_url: config.api_url.clone(),
        provider: Some(
            config
                .provider
                .unwrap_or_else(|| detect_provider_type(&config.api_url))
                .to_string(),
        ),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        seed: config.seed,
        timeout_secs: config.timeout_secs,
        taxonomy_file: config
            .taxonomy_file
            .as_ref()
            .map(|p| p.display().to_string()),
        batching: Some(config.batching.clone()),
        on_unrecognized_label: Some(config.on_unrecognized_label),
        response_shape: Some(config.response_shape),
        latency_ms,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Classify `responses` against the configured remote model
///
/// Fails only on configuration problems. Service failures during the run are
/// absorbed by the batch controller and show up as unclassified responses.
pub async fn classify_responses(
    config: &RunConfig,
    responses: &[String],
) -> Result<ClassificationReport, ClassifierError> {
    let classifier = LlmClassifier::from_config(config);
    classify_with(&classifier, config, responses).await
}

/// Same as [`classify_responses`] with a caller-supplied classifier
pub async fn classify_with(
    classifier: &dyn BatchClassifier,
    config: &RunConfig,
    responses: &[String],
) -> Result<ClassificationReport, ClassifierError> {
    let start_time = Instant::now();

    config.batching.validate()?;

    if responses.is_empty() {
        log::warn!("No responses to classify");
    }

    let controller = BatchController::new(
        classifier,
        BatchPlanner::new(config.batching.clone()),
        Reconciler::new(config.on_unrecognized_label),
        Duration::from_secs(config.timeout_secs),
    )
    .with_taxonomy(&config.taxonomy);

    let run = controller.run(responses).await;

    let metadata = create_metadata(config, start_time.elapsed().as_millis() as u64);
    Ok(ClassificationReport::success(&run, metadata))
}
