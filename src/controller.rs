//! Adaptive batch controller
//!
//! Walks the responses with a cursor, sizing each window with the planner,
//! classifying it, and adjusting the batch size from the outcome:
//!
//! ```text
//! SIZING -> CLASSIFYING -> SUCCESS         -> advance, grow      -> SIZING | DONE
//!                       -> PARTIAL_FAILURE -> shrink, same cursor -> SIZING
//!                       -> HARD_FAILURE    -> shrink, same cursor -> SIZING
//! ```
//!
//! A window no larger than the minimum batch size that still fails is
//! classified one response at a time, so a single bad response cannot stall
//! the run. Requests are issued one after another, never concurrently.

use crate::{
    classifier::BatchClassifier,
    constants::batching::{GROWTH_FACTOR, MAX_CONSECUTIVE_FAILURES, SHRINK_FACTOR},
    error::ClassifierError,
    planner::{BatchPlanner, BatchingConfig},
    reconciler::{Classification, ParseStage, Reconciler, Reconciliation},
    taxonomy::Taxonomy,
};
use serde::Serialize;
use std::time::Duration;

/// One response paired with its classification, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedResult {
    pub response: String,
    pub classification: Option<Classification>,
}

/// How a classification attempt for one window ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every response in the window was reconciled
    Success,
    /// The reply was usable for some responses but not all (possibly none)
    PartialFailure { reconciled: usize },
    /// The call itself failed (transport error, service error, timeout)
    HardFailure,
}

impl BatchOutcome {
    fn from_attempt(attempt: &Result<Reconciliation, ClassifierError>) -> Self {
        match attempt {
            Ok(r) if r.is_complete() => Self::Success,
            Ok(r) => Self::PartialFailure {
                reconciled: r.reconciled_count(),
            },
            Err(_) => Self::HardFailure,
        }
    }
}

/// Loop state owned by the controller for the duration of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    /// Index of the first response not yet processed
    pub cursor: usize,
    pub batch_size: usize,
    pub consecutive_failures: u32,
}

impl ControllerState {
    pub fn new(batch_size: usize) -> Self {
        Self {
            cursor: 0,
            batch_size,
            consecutive_failures: 0,
        }
    }

    /// Next state after classifying a window of `window_len` responses
    pub fn apply(self, outcome: BatchOutcome, window_len: usize, config: &BatchingConfig) -> Self {
        match outcome {
            BatchOutcome::Success => Self {
                cursor: self.cursor + window_len,
                batch_size: grow(self.batch_size, config),
                consecutive_failures: 0,
            },
            BatchOutcome::PartialFailure { .. } | BatchOutcome::HardFailure => {
                let consecutive_failures = self.consecutive_failures + 1;
                // Shrink from what was sent, which may be below the stored size
                let mut batch_size = shrink(window_len.min(self.batch_size), config);
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    batch_size = batch_size.min(config.min_batch_size);
                }
                Self {
                    cursor: self.cursor,
                    batch_size,
                    consecutive_failures,
                }
            }
        }
    }

    /// Resize after a window of `window_len` was estimated over the token budget
    ///
    /// Not a failure: the counter is untouched and the cursor stays put.
    pub fn shrink_to_fit(self, window_len: usize, config: &BatchingConfig) -> Self {
        Self {
            batch_size: shrink(window_len, config),
            ..self
        }
    }

    /// Leave a window that was classified item by item
    pub fn after_single_item_pass(self, window_len: usize, config: &BatchingConfig) -> Self {
        Self {
            cursor: self.cursor + window_len,
            batch_size: self.batch_size.min(config.min_batch_size).max(1),
            consecutive_failures: 0,
        }
    }
}

fn grow(size: usize, config: &BatchingConfig) -> usize {
    ((size as f64 * GROWTH_FACTOR).floor() as usize)
        .max(size)
        .min(config.max_batch_size)
}

/// Never grows, never drops below the minimum unless already there
fn shrink(size: usize, config: &BatchingConfig) -> usize {
    ((size as f64 * SHRINK_FACTOR).floor() as usize)
        .max(config.min_batch_size)
        .min(size)
        .max(1)
}

/// Counters describing how a run went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total_responses: usize,
    pub classified: usize,
    pub unclassified: usize,
    /// Remote calls issued, single-item calls included
    pub requests: usize,
    pub successful_batches: usize,
    pub partial_failures: usize,
    pub hard_failures: usize,
    /// Windows re-sliced because their estimated tokens exceeded the budget
    pub token_resizes: usize,
    /// Windows that fell back to one request per response
    pub single_item_fallbacks: usize,
    /// Classified responses whose category/subcategory is not in the taxonomy
    pub out_of_taxonomy: usize,
    pub error_sentinels: usize,
}

/// Final output of a run: one result per input response, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRun {
    pub results: Vec<ClassifiedResult>,
    pub stats: RunStats,
}

/// Drives classification of a whole response list
pub struct BatchController<'a> {
    classifier: &'a dyn BatchClassifier,
    planner: BatchPlanner,
    reconciler: Reconciler,
    call_timeout: Duration,
    taxonomy: Option<&'a Taxonomy>,
}

impl<'a> BatchController<'a> {
    pub fn new(
        classifier: &'a dyn BatchClassifier,
        planner: BatchPlanner,
        reconciler: Reconciler,
        call_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            planner,
            reconciler,
            call_timeout,
            taxonomy: None,
        }
    }

    /// Count labels outside `taxonomy` (they are still passed through)
    pub fn with_taxonomy(mut self, taxonomy: &'a Taxonomy) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    /// Classify every response
    ///
    /// Always completes. Responses that could not be classified are returned
    /// with `classification: None` and counted in `stats.unclassified`.
    pub async fn run(&self, responses: &[String]) -> ClassificationRun {
        let total = responses.len();
        let config = self.planner.config();
        let mut results = Vec::with_capacity(total);
        let mut stats = RunStats {
            total_responses: total,
            ..RunStats::default()
        };
        let mut state = ControllerState::new(self.planner.plan(total, Some(responses)));

        log::info!(
            "Classifying {total} responses (initial batch size {})",
            state.batch_size
        );

        while state.cursor < total {
            let remaining = &responses[state.cursor..];
            let plan = self.planner.plan_window(remaining, state.batch_size);
            let window = &remaining[..plan.size];

            if self.planner.exceeds_budget(&plan) {
                if plan.size > config.min_batch_size {
                    stats.token_resizes += 1;
                    log::debug!(
                        "Window of {} at {} is ~{:.0} tokens (budget {}), shrinking",
                        plan.size,
                        state.cursor,
                        plan.token_estimate,
                        config.max_tokens_per_batch
                    );
                    state = state.shrink_to_fit(plan.size, config);
                    continue;
                }
                if plan.size > 1 {
                    log::warn!(
                        "Window of {} at {} exceeds the token budget at minimum size; \
                         classifying responses individually",
                        plan.size,
                        state.cursor
                    );
                    stats.single_item_fallbacks += 1;
                    let items = self
                        .classify_individually(window, state.cursor, vec![None; window.len()], &mut stats)
                        .await;
                    self.collect(window, items, &mut results, &mut stats);
                    state = state.after_single_item_pass(window.len(), config);
                    continue;
                }
                log::warn!(
                    "Response {} alone is ~{:.0} tokens, over the budget of {}; sending anyway",
                    state.cursor,
                    plan.token_estimate,
                    config.max_tokens_per_batch
                );
            }

            stats.requests += 1;
            let attempt = self.attempt(window).await;
            let outcome = BatchOutcome::from_attempt(&attempt);

            match outcome {
                BatchOutcome::Success => {
                    stats.successful_batches += 1;
                    log::info!(
                        "Classified responses {}..{} of {total}",
                        state.cursor + 1,
                        state.cursor + window.len()
                    );
                    let items = attempt.map(|r| r.items).unwrap_or_default();
                    self.collect(window, items, &mut results, &mut stats);
                    state = state.apply(outcome, window.len(), config);
                    continue;
                }
                BatchOutcome::PartialFailure { reconciled } => {
                    stats.partial_failures += 1;
                    if matches!(&attempt, Ok(r) if r.is_batch_failure()) {
                        log::warn!("Batch at {} returned no usable JSON", state.cursor);
                    } else {
                        log::warn!(
                            "Batch at {} reconciled {reconciled}/{} responses",
                            state.cursor,
                            window.len()
                        );
                    }
                }
                BatchOutcome::HardFailure => {
                    stats.hard_failures += 1;
                    if let Err(e) = &attempt {
                        log::warn!("Batch at {} failed: {e}", state.cursor);
                    }
                }
            }

            if window.len() <= config.min_batch_size {
                stats.single_item_fallbacks += 1;
                log::info!(
                    "Falling back to single-response requests for {} responses at {}",
                    window.len(),
                    state.cursor
                );
                // Same window boundaries, so items already reconciled stay valid
                let salvaged = attempt
                    .map(|r| r.items)
                    .unwrap_or_else(|_| vec![None; window.len()]);
                let items = self
                    .classify_individually(window, state.cursor, salvaged, &mut stats)
                    .await;
                self.collect(window, items, &mut results, &mut stats);
                state = state.after_single_item_pass(window.len(), config);
            } else {
                state = state.apply(outcome, window.len(), config);
                log::debug!(
                    "Batch size reduced to {} after {} consecutive failure(s)",
                    state.batch_size,
                    state.consecutive_failures
                );
            }
        }

        stats.classified = results
            .iter()
            .filter(|r| r.classification.is_some())
            .count();
        stats.unclassified = total - stats.classified;

        if stats.unclassified > 0 {
            log::warn!(
                "{} of {total} responses could not be classified",
                stats.unclassified
            );
        }
        log::info!(
            "Classification finished: {} classified, {} requests",
            stats.classified,
            stats.requests
        );

        ClassificationRun { results, stats }
    }

    /// One bounded call plus reconciliation
    async fn attempt(&self, window: &[String]) -> Result<Reconciliation, ClassifierError> {
        let raw = tokio::time::timeout(self.call_timeout, self.classifier.classify(window))
            .await
            .map_err(|_| ClassifierError::Timeout(self.call_timeout.as_secs()))??;

        let reconciliation = self.reconciler.reconcile(&raw, window);
        if reconciliation.stage != ParseStage::Strict {
            log::debug!("Reply parsed at stage {:?}", reconciliation.stage);
        }
        for issue in &reconciliation.issues {
            log::debug!("Reconcile: {issue}");
        }
        Ok(reconciliation)
    }

    async fn classify_individually(
        &self,
        window: &[String],
        base: usize,
        salvaged: Vec<Option<Classification>>,
        stats: &mut RunStats,
    ) -> Vec<Option<Classification>> {
        let mut items = Vec::with_capacity(window.len());

        for (offset, (response, prior)) in window.iter().zip(salvaged).enumerate() {
            if prior.is_some() {
                items.push(prior);
                continue;
            }

            stats.requests += 1;
            let item = match self.attempt(std::slice::from_ref(response)).await {
                Ok(reconciliation) => {
                    let item = reconciliation.items.into_iter().next().flatten();
                    if item.is_none() {
                        log::warn!(
                            "Response {} could not be reconciled: {}",
                            base + offset,
                            reconciliation
                                .issues
                                .iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>()
                                .join("; ")
                        );
                    }
                    item
                }
                Err(e) => {
                    log::warn!("Response {} could not be classified: {e}", base + offset);
                    None
                }
            };
            items.push(item);
        }

        items
    }

    fn collect(
        &self,
        window: &[String],
        items: Vec<Option<Classification>>,
        results: &mut Vec<ClassifiedResult>,
        stats: &mut RunStats,
    ) {
        for (response, classification) in window.iter().zip(items) {
            if let Some(c) = &classification {
                if c.is_error_sentinel() {
                    stats.error_sentinels += 1;
                } else if let Some(taxonomy) = self.taxonomy {
                    if !taxonomy.contains(&c.category, &c.subcategory) {
                        stats.out_of_taxonomy += 1;
                        log::debug!(
                            "Label outside taxonomy: {} / {}",
                            c.category,
                            c.subcategory
                        );
                    }
                }
            }
            results.push(ClassifiedResult {
                response: response.clone(),
                classification,
            });
        }
    }
}
