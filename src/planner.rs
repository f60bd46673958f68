//! Batch sizing
//!
//! Short responses allow large batches (fewer round trips); long responses
//! must be capped to stay under the model's context window and to bound the
//! damage a single malformed reply can do.

use crate::{constants::batching, error::ClassifierError, token_estimator::TokenEstimator};
use serde::{Deserialize, Serialize};

/// Batch sizing tunables
///
/// Fixed for the duration of a run; the controller only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub max_tokens_per_batch: usize,
    pub prompt_template_tokens: usize,
    pub tokens_per_char: f64,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            min_batch_size: batching::MIN_BATCH_SIZE,
            max_batch_size: batching::MAX_BATCH_SIZE,
            max_tokens_per_batch: batching::MAX_TOKENS_PER_BATCH,
            prompt_template_tokens: batching::PROMPT_TEMPLATE_TOKENS,
            tokens_per_char: batching::TOKENS_PER_CHAR,
        }
    }
}

impl BatchingConfig {
    /// Reject bounds the planner and controller cannot honor
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.min_batch_size < 1 {
            return Err(ClassifierError::Configuration(
                "min_batch_size must be >= 1".to_string(),
            ));
        }
        if self.max_batch_size < self.min_batch_size {
            return Err(ClassifierError::Configuration(format!(
                "max_batch_size ({}) must be >= min_batch_size ({})",
                self.max_batch_size, self.min_batch_size
            )));
        }
        if self.max_tokens_per_batch <= self.prompt_template_tokens {
            return Err(ClassifierError::Configuration(format!(
                "max_tokens_per_batch ({}) must exceed prompt_template_tokens ({})",
                self.max_tokens_per_batch, self.prompt_template_tokens
            )));
        }
        if !self.tokens_per_char.is_finite() || self.tokens_per_char <= 0.0 {
            return Err(ClassifierError::Configuration(format!(
                "tokens_per_char must be a positive number, got {}",
                self.tokens_per_char
            )));
        }
        Ok(())
    }

    /// Tokens left for response text once the prompt template is accounted for
    pub fn tokens_available(&self) -> usize {
        self.max_tokens_per_batch
            .saturating_sub(self.prompt_template_tokens)
    }

    pub fn estimator(&self) -> TokenEstimator {
        TokenEstimator::new(self.tokens_per_char)
    }
}

/// A sized window, recomputed on every controller iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPlan {
    pub size: usize,
    pub token_estimate: f64,
}

/// Computes batch sizes from item counts and, when known, response lengths
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    config: BatchingConfig,
    estimator: TokenEstimator,
}

impl BatchPlanner {
    pub fn new(config: BatchingConfig) -> Self {
        let estimator = config.estimator();
        Self { config, estimator }
    }

    pub fn config(&self) -> &BatchingConfig {
        &self.config
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Suggested batch size for `total_items` responses
    ///
    /// Returns `total_items` when it does not exceed the minimum batch size.
    /// Otherwise the result is within `[min_batch_size, max_batch_size]` and
    /// never above `total_items`.
    pub fn plan(&self, total_items: usize, responses: Option<&[String]>) -> usize {
        let min = self.config.min_batch_size;
        let max = self.config.max_batch_size;

        if total_items <= min {
            return total_items;
        }

        let suggested = match responses.filter(|r| !r.is_empty()) {
            Some(texts) => {
                let avg_tokens = self.estimator.average(texts);
                if avg_tokens <= 0.0 {
                    max
                } else {
                    (self.config.tokens_available() as f64 / avg_tokens).floor() as usize
                }
            }
            // Unknown lengths: about a third of the run per request
            None => total_items / 3,
        };

        suggested.clamp(min, max).min(total_items)
    }

    /// Size and cost of the window starting at the head of `remaining`
    ///
    /// `ceiling` is the controller's current adaptive batch size.
    pub fn plan_window(&self, remaining: &[String], ceiling: usize) -> BatchPlan {
        let planned = self.plan(remaining.len(), Some(remaining));
        let size = planned.min(ceiling.max(1)).min(remaining.len());
        BatchPlan {
            size,
            token_estimate: self.estimator.estimate_window(&remaining[..size]),
        }
    }

    /// Whether a window's estimated cost exceeds the per-request budget
    pub fn exceeds_budget(&self, plan: &BatchPlan) -> bool {
        plan.token_estimate > self.config.max_tokens_per_batch as f64
    }
}
