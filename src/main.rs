mod cli;

use clap::{CommandFactory, Parser};
use cli::{
    load_responses, unescape_separator, validate_file_exists, validate_positive,
    validate_temperature, write_report,
};
use experience_classifier::{
    classify_responses, config_builder::ConfigBuilder, constants::prompt::DEFAULT_INPUT_SEPARATOR,
    load_config_file, ClassificationReport, ClassifierError, Metadata, Provider, ResponseShape,
    UnrecognizedLabelPolicy,
};
use figment::{
    providers::{Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, process};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[command(name = "experience-classifier")]
#[command(about = "Classify free-text survey responses into category, subcategory and sentiment with an LLM", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[serde(default)]
struct Args {
    /// Config file (JSON or TOML) with default run parameters
    /// Note: any CLI argument will override the corresponding config file value
    #[arg(long, short = 'c', value_parser = validate_file_exists)]
    #[serde(skip)]
    config_file: Option<PathBuf>,

    /// LLM API endpoint URL
    #[arg(long, short = 'a')]
    #[serde(skip_serializing_if = "Option::is_none")]
    api_url: Option<String>,

    /// Model name/identifier
    #[arg(long, short = 'm')]
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// Force specific provider format (overrides auto-detection)
    #[arg(long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<ProviderArg>,

    /// API key for authentication (direct value)
    #[arg(long, conflicts_with = "api_key_name")]
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,

    /// Environment variable name containing the API key
    #[arg(long, conflicts_with = "api_key")]
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key_name: Option<String>,

    /// Text file with the responses to classify
    #[arg(long, short = 'i', value_parser = validate_file_exists)]
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<PathBuf>,

    /// Separator between responses in the input file (escapes like \n are understood)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    separator: Option<String>,

    /// Category taxonomy (YAML)
    #[arg(long, short = 'x', value_parser = validate_file_exists)]
    #[serde(skip_serializing_if = "Option::is_none")]
    taxonomy_file: Option<PathBuf>,

    /// Sampling temperature
    #[arg(long, short = 't', value_parser = validate_temperature)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum response tokens
    #[arg(long, value_parser = validate_positive::<u32>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,

    /// Random seed for reproducible sampling
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,

    /// Per-request timeout in seconds (must be > 0)
    #[arg(long = "timeout", value_parser = validate_positive::<u64>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,

    /// Smallest batch size; failing batches of this size fall back to one request per response
    #[arg(long, value_parser = validate_positive::<usize>)]
    #[serde(skip)]
    min_batch_size: Option<usize>,

    /// Largest batch size
    #[arg(long, value_parser = validate_positive::<usize>)]
    #[serde(skip)]
    max_batch_size: Option<usize>,

    /// Estimated token budget for one batch
    #[arg(long, value_parser = validate_positive::<usize>)]
    #[serde(skip)]
    max_tokens_per_batch: Option<usize>,

    /// What to do with sentiment labels that match no known value
    #[arg(long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    on_unrecognized_label: Option<LabelPolicyArg>,

    /// JSON layout requested from the model
    #[arg(long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    response_shape: Option<ResponseShapeArg>,

    /// Enable verbose logging (DEBUG level)
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    #[serde(skip, default)]
    verbose: bool,

    /// Suppress all logging output
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    #[serde(skip, default)]
    quiet: bool,

    /// Write the report to a file instead of stdout
    /// Uses atomic writes (temp file + rename) and creates parent directories
    #[arg(long, short = 'o')]
    #[serde(skip)]
    output: Option<PathBuf>,
}

/// Merge config file and CLI args using figment
/// Priority: CLI args > Config file
fn merge_config(args: &Args) -> Result<Args, ClassifierError> {
    let Some(config_path) = &args.config_file else {
        return Ok(args.clone());
    };

    let file_provider = match config_path.extension().and_then(|s| s.to_str()) {
        Some("json") => Figment::from(Json::file(config_path)),
        Some("toml") => Figment::from(Toml::file(config_path)),
        _ => {
            return Err(ClassifierError::InvalidArguments(
                "Config file must have .json or .toml extension".to_string(),
            ));
        }
    };

    let merged: Args = file_provider
        .merge(Serialized::defaults(args))
        .extract()
        .map_err(|e| ClassifierError::InvalidArguments(format!("Failed to merge config: {e}")))?;

    // Fields marked #[serde(skip)] never reach figment and must be restored here.
    // Batching flags are skipped because the file keeps them in a [batching] table,
    // which ConfigBuilder::merge_file_config reads.
    Ok(Args {
        config_file: args.config_file.clone(),
        min_batch_size: args.min_batch_size,
        max_batch_size: args.max_batch_size,
        max_tokens_per_batch: args.max_tokens_per_batch,
        verbose: args.verbose,
        quiet: args.quiet,
        output: args.output.clone(),
        ..merged
    })
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ProviderArg {
    Ollama,
    #[value(name = "openai")]
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Ollama => Provider::Ollama,
            ProviderArg::OpenAI => Provider::OpenAI,
            ProviderArg::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LabelPolicyArg {
    #[value(name = "drop")]
    Drop,
    #[value(name = "default_neutral")]
    DefaultNeutral,
    #[value(name = "tag_error")]
    TagError,
}

impl From<LabelPolicyArg> for UnrecognizedLabelPolicy {
    fn from(arg: LabelPolicyArg) -> Self {
        match arg {
            LabelPolicyArg::Drop => UnrecognizedLabelPolicy::Drop,
            LabelPolicyArg::DefaultNeutral => UnrecognizedLabelPolicy::DefaultNeutral,
            LabelPolicyArg::TagError => UnrecognizedLabelPolicy::TagError,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ResponseShapeArg {
    Flat,
    Paired,
}

impl From<ResponseShapeArg> for ResponseShape {
    fn from(arg: ResponseShapeArg) -> Self {
        match arg {
            ResponseShapeArg::Flat => ResponseShape::Flat,
            ResponseShapeArg::Paired => ResponseShape::Paired,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if it exists (silently ignore if not found)
    dotenvy::dotenv().ok();

    if std::env::args().len() == 1 {
        let _ = Args::command().print_help(); // Ignore broken pipe errors
        println!();
        process::exit(0);
    }

    let args = Args::parse();

    // quiet: no logs, verbose: DEBUG+, default: INFO+
    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.args()
            )
        })
        .init();

    let output_path = args.output.clone();

    match run(args).await {
        Ok(report) => {
            if let Err(e) = write_report(&report, output_path.as_deref()) {
                eprintln!("Error writing output: {e}");
                process::exit(1);
            }
            process::exit(0);
        }
        Err(e) => {
            log::error!("{e}");
            let report =
                ClassificationReport::error(e.code().to_string(), e.to_string(), Metadata::unavailable());

            if let Err(io_err) = write_report(&report, output_path.as_deref()) {
                eprintln!("Error writing output: {io_err}");
                process::exit(1);
            }

            process::exit(e.exit_code());
        }
    }
}

async fn run(args: Args) -> Result<ClassificationReport, ClassifierError> {
    let merged_args = merge_config(&args)?;

    // Figment covers the flat keys; the [batching] table and json_output are
    // only available through the typed config file request.
    let file_config = match &merged_args.config_file {
        Some(config_path) => Some(load_config_file(config_path)?),
        None => None,
    };

    let mut builder = ConfigBuilder::new();

    if let Some(ref api_url) = merged_args.api_url {
        builder = builder.api_url(api_url.clone());
    }
    if let Some(ref model) = merged_args.model {
        builder = builder.model(model.clone());
    }
    if let Some(provider) = merged_args.provider {
        builder = builder.provider(provider.into());
    }
    if let Some(temperature) = merged_args.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(max_tokens) = merged_args.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }
    if let Some(seed) = merged_args.seed {
        builder = builder.seed(seed);
    }
    if let Some(timeout_secs) = merged_args.timeout_secs {
        builder = builder.timeout_secs(timeout_secs);
    }
    if let Some(ref path) = merged_args.taxonomy_file {
        builder = builder.taxonomy_file(path.clone());
    }
    if let Some(size) = merged_args.min_batch_size {
        builder = builder.min_batch_size(size);
    }
    if let Some(size) = merged_args.max_batch_size {
        builder = builder.max_batch_size(size);
    }
    if let Some(tokens) = merged_args.max_tokens_per_batch {
        builder = builder.max_tokens_per_batch(tokens);
    }
    if let Some(policy) = merged_args.on_unrecognized_label {
        builder = builder.on_unrecognized_label(policy.into());
    }
    if let Some(shape) = merged_args.response_shape {
        builder = builder.response_shape(shape.into());
    }

    // API key (CLI direct > CLI env var > config file env var > config file direct)
    if let Some(ref key) = merged_args.api_key {
        builder = builder.api_key(key.clone());
    } else if let Some(ref env_var_name) = merged_args.api_key_name {
        let key = std::env::var(env_var_name).map_err(|_| {
            ClassifierError::InvalidArguments(format!(
                "Environment variable '{env_var_name}' specified by api_key_name does not exist"
            ))
        })?;
        log::debug!("API key loaded from environment variable: {env_var_name}");
        builder = builder.api_key(key);
    }

    if let Some(file_cfg) = file_config.as_ref() {
        builder = builder.merge_file_config(file_cfg)?;
    }

    let config = builder.build()?;

    let input = merged_args.input.as_ref().ok_or_else(|| {
        ClassifierError::InvalidArguments(
            "Responses file must be provided via --input or 'input' in config file".to_string(),
        )
    })?;
    let separator = merged_args
        .separator
        .as_deref()
        .map(unescape_separator)
        .unwrap_or_else(|| DEFAULT_INPUT_SEPARATOR.to_string());
    let responses = load_responses(input, &separator)?;

    log::debug!("=== Run Parameters ===");
    log::debug!("API URL: {}", config.api_url);
    log::debug!("Model: {}", config.model);
    log::debug!("Provider: {:?}", config.provider);
    log::debug!("Temperature: {}", config.temperature);
    log::debug!("Timeout: {}s", config.timeout_secs);
    log::debug!(
        "API key: {}",
        if config.api_key.is_some() {
            "[REDACTED]"
        } else {
            "[NOT SET]"
        }
    );
    log::debug!(
        "Taxonomy: {} categories, {} subcategories",
        config.taxonomy.categories.len(),
        config.taxonomy.subcategory_count()
    );
    log::debug!("Batching: {:?}", config.batching);
    log::debug!("Unrecognized labels: {:?}", config.on_unrecognized_label);
    log::debug!("Response shape: {:?}", config.response_shape);
    log::debug!("Responses: {}", responses.len());
    log::debug!("======================");

    classify_responses(&config, &responses).await
}
