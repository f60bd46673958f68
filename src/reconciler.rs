//! Model output reconciliation
//!
//! Turns the free text returned by the model into one canonical
//! [`Classification`] (or `None`) per response of the batch. Parsing is
//! attempted in stages, each only when the previous one failed:
//!
//! 1. strict JSON parse of the raw text
//! 2. retry after stripping markdown fences and a `json` language tag
//! 3. partial recovery: extract balanced `{...}` objects one by one and keep
//!    the ones carrying both `response` and `classification`
//! 4. total failure: every slot of the batch is `None`
//!
//! Reconciliation is a pure function of the raw text and the batch.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Fenced code block anywhere in the text: ```json ... ```
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("valid fenced block regex")
});

/// Item label the prompt puts in front of every response, sometimes echoed back
static ITEM_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:response)\s*\d+\s*[:\-]\s*").expect("valid item label regex")
});

const TYPE_KEYS: &[&str] = &["type", "sentiment", "نوع", "النوع"];
const CATEGORY_KEYS: &[&str] = &["category", "تصنيف", "التصنيف"];
const SUBCATEGORY_KEYS: &[&str] = &[
    "subcategory",
    "sub_category",
    "تصنيف_فرعي",
    "التصنيف_فرعي",
    "التصنيف_الفرعي",
    "التصنيف الفرعي",
];
const EXPLANATION_KEYS: &[&str] = &["explanation", "تفسير", "التفسير"];
const RESPONSE_KEY: &str = "response";
const CLASSIFICATION_KEY: &str = "classification";

/// Canonical sentiment labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Error,
}

impl Sentiment {
    /// Fold spelling and gender variants into a canonical label
    pub fn fold(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        match value.as_str() {
            "إيجابي" | "ايجابي" | "ايجابية" | "إيجابية" | "positive" => Some(Self::Positive),
            "سلبي" | "سلبية" | "negative" => Some(Self::Negative),
            "محايد" | "محايدة" | "neutral" => Some(Self::Neutral),
            "خطأ" | "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated classification for one response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub sentiment: Sentiment,
    pub category: String,
    pub subcategory: String,
    pub explanation: String,
}

impl Classification {
    /// Sentinel used by [`UnrecognizedLabelPolicy::TagError`]
    pub fn error_sentinel(explanation: impl Into<String>) -> Self {
        Self {
            sentiment: Sentiment::Error,
            category: "error".to_string(),
            subcategory: "error".to_string(),
            explanation: explanation.into(),
        }
    }

    pub fn is_error_sentinel(&self) -> bool {
        self.sentiment == Sentiment::Error
    }
}

/// What to do with a sentiment value that folds to no known label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedLabelPolicy {
    /// The item is left unclassified
    #[default]
    Drop,
    /// The item is kept with a neutral sentiment
    DefaultNeutral,
    /// The item is replaced by the error sentinel
    TagError,
}

impl UnrecognizedLabelPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "drop" => Some(Self::Drop),
            "default_neutral" | "neutral" => Some(Self::DefaultNeutral),
            "tag_error" | "error" => Some(Self::TagError),
            _ => None,
        }
    }
}

/// Which parsing stage produced the structure that was reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    Strict,
    FenceStripped,
    PartialRecovery,
    Failed,
}

/// Problems found while reconciling, reported to the controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileIssue {
    /// No parsing stage produced anything usable for the batch
    #[error("model output is not parseable JSON")]
    BatchJsonUnparseable,

    /// The model returned a single object instead of an array
    #[error("model returned a single object, wrapped into an array")]
    ShapeMismatch,

    /// One slot could not be validated; the rest of the batch is unaffected
    #[error("item {index} invalid: {reason}")]
    ItemInvalid { index: usize, reason: String },
}

/// Outcome of reconciling one raw model reply against its batch
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// One entry per batch item, same order as the batch
    pub items: Vec<Option<Classification>>,
    pub issues: Vec<ReconcileIssue>,
    pub stage: ParseStage,
}

impl Reconciliation {
    fn failed(batch_len: usize) -> Self {
        Self {
            items: vec![None; batch_len],
            issues: vec![ReconcileIssue::BatchJsonUnparseable],
            stage: ParseStage::Failed,
        }
    }

    pub fn reconciled_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_some()).count()
    }

    /// Every slot holds a classification
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(Option::is_some)
    }

    pub fn is_batch_failure(&self) -> bool {
        self.stage == ParseStage::Failed
    }
}

/// The two layouts the model may answer with, resolved once per reply
#[derive(Debug)]
enum RawShape {
    /// Classification objects aligned positionally with the batch
    Flat(Vec<Value>),
    /// `{response, classification}` pairs aligned by response text
    Paired(Vec<PairedItem>),
}

#[derive(Debug)]
struct PairedItem {
    response: String,
    classification: Value,
}

impl RawShape {
    fn detect(items: Vec<Value>) -> Self {
        let paired = items
            .iter()
            .any(|item| item.as_object().is_some_and(|obj| has_key(obj, RESPONSE_KEY)));
        if !paired {
            return Self::Flat(items);
        }

        Self::Paired(
            items
                .into_iter()
                .map(|item| {
                    let response = item
                        .as_object()
                        .and_then(|obj| lookup(obj, &[RESPONSE_KEY]))
                        .map(text_of)
                        .unwrap_or_default();
                    // Pairs sometimes come back flattened: {response, type, category, ...}
                    let classification = item
                        .as_object()
                        .and_then(|obj| lookup(obj, &[CLASSIFICATION_KEY]).cloned())
                        .unwrap_or(item);
                    PairedItem {
                        response,
                        classification,
                    }
                })
                .collect(),
        )
    }
}

/// Parses, repairs and normalizes model output
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: UnrecognizedLabelPolicy,
}

impl Reconciler {
    pub fn new(policy: UnrecognizedLabelPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnrecognizedLabelPolicy {
        self.policy
    }

    /// Reconcile `raw_text` against `batch`
    ///
    /// Always returns exactly `batch.len()` items.
    pub fn reconcile(&self, raw_text: &str, batch: &[String]) -> Reconciliation {
        let mut issues = Vec::new();

        let (shape, stage, positional) = if let Some(items) = parse_items(raw_text, &mut issues) {
            (RawShape::detect(items), ParseStage::Strict, true)
        } else if let Some(items) = fence_candidates(raw_text)
            .iter()
            .find_map(|candidate| parse_items(candidate, &mut issues))
        {
            log::debug!("Model output parsed after stripping markdown fences");
            (RawShape::detect(items), ParseStage::FenceStripped, true)
        } else {
            let recovered = recover_pairs(raw_text);
            if recovered.is_empty() {
                log::warn!(
                    "Model output unparseable for batch of {} (preview: {}...)",
                    batch.len(),
                    raw_text.chars().take(120).collect::<String>()
                );
                return Reconciliation::failed(batch.len());
            }
            log::warn!(
                "Recovered {} object(s) from malformed model output for batch of {}",
                recovered.len(),
                batch.len()
            );
            (
                RawShape::detect(recovered),
                ParseStage::PartialRecovery,
                false,
            )
        };

        let items = match shape {
            RawShape::Flat(values) => self.align_flat(values, batch.len(), &mut issues),
            RawShape::Paired(pairs) => self.align_paired(pairs, batch, positional, &mut issues),
        };

        Reconciliation {
            items,
            issues,
            stage,
        }
    }

    fn align_flat(
        &self,
        values: Vec<Value>,
        batch_len: usize,
        issues: &mut Vec<ReconcileIssue>,
    ) -> Vec<Option<Classification>> {
        if values.len() > batch_len {
            log::warn!(
                "Model returned {} classifications for {} responses; ignoring the extra ones",
                values.len(),
                batch_len
            );
        }

        let mut values = values.into_iter();
        (0..batch_len)
            .map(|index| match values.next() {
                Some(value) => self.validate_item(&value, index, issues),
                None => {
                    issues.push(ReconcileIssue::ItemInvalid {
                        index,
                        reason: "missing from model output".to_string(),
                    });
                    None
                }
            })
            .collect()
    }

    fn align_paired(
        &self,
        pairs: Vec<PairedItem>,
        batch: &[String],
        positional: bool,
        issues: &mut Vec<ReconcileIssue>,
    ) -> Vec<Option<Classification>> {
        let mut items: Vec<Option<Classification>> = vec![None; batch.len()];
        let mut assigned = vec![false; batch.len()];

        for (position, pair) in pairs.into_iter().enumerate() {
            let wanted = comparable(&pair.response);
            let target = batch
                .iter()
                .enumerate()
                .position(|(i, original)| !assigned[i] && comparable(original) == wanted)
                .or_else(|| {
                    (positional && position < batch.len() && !assigned[position])
                        .then_some(position)
                });

            match target {
                Some(index) => {
                    assigned[index] = true;
                    items[index] = self.validate_item(&pair.classification, index, issues);
                }
                None => {
                    log::debug!("Dropping classification for unknown response at position {position}");
                }
            }
        }

        for (index, done) in assigned.iter().enumerate() {
            if !done {
                issues.push(ReconcileIssue::ItemInvalid {
                    index,
                    reason: "missing from model output".to_string(),
                });
            }
        }

        items
    }

    fn validate_item(
        &self,
        value: &Value,
        index: usize,
        issues: &mut Vec<ReconcileIssue>,
    ) -> Option<Classification> {
        match self.normalize(value) {
            Ok(classification) => Some(classification),
            Err(reason) => {
                log::debug!("Item {index} rejected: {reason}");
                issues.push(ReconcileIssue::ItemInvalid { index, reason });
                None
            }
        }
    }

    /// Map one classification object onto the canonical schema
    fn normalize(&self, value: &Value) -> Result<Classification, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "classification is not an object".to_string())?;

        let raw_type = match lookup(obj, TYPE_KEYS) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => return Err("missing sentiment field".to_string()),
            Some(other) => other.to_string(),
        };

        let sentiment = match Sentiment::fold(&raw_type) {
            Some(sentiment) => sentiment,
            None => match self.policy {
                UnrecognizedLabelPolicy::Drop => {
                    return Err(format!("unrecognized sentiment '{raw_type}'"));
                }
                UnrecognizedLabelPolicy::DefaultNeutral => Sentiment::Neutral,
                UnrecognizedLabelPolicy::TagError => {
                    return Ok(Classification::error_sentinel(format!(
                        "unrecognized sentiment '{raw_type}'"
                    )));
                }
            },
        };

        Ok(Classification {
            sentiment,
            category: lookup(obj, CATEGORY_KEYS).map(text_of).unwrap_or_default(),
            subcategory: lookup(obj, SUBCATEGORY_KEYS)
                .map(text_of)
                .unwrap_or_default(),
            explanation: lookup(obj, EXPLANATION_KEYS)
                .map(text_of)
                .unwrap_or_default(),
        })
    }
}

/// Parse text into a list of items
///
/// Arrays are returned as is. A single object is wrapped into a singleton
/// (recording a shape mismatch), unless it merely wraps an array under one
/// key, in which case that array is used.
fn parse_items(text: &str, issues: &mut Vec<ReconcileIssue>) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text.trim()).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(obj) => {
            issues.push(ReconcileIssue::ShapeMismatch);
            if lookup(&obj, TYPE_KEYS).is_none() && !has_key(&obj, RESPONSE_KEY) {
                let mut arrays = obj.values().filter_map(Value::as_array);
                if let (Some(inner), None) = (arrays.next(), arrays.next()) {
                    return Some(inner.clone());
                }
            }
            Some(vec![Value::Object(obj)])
        }
        _ => None,
    }
}

/// Texts to retry after removing markdown decoration
fn fence_candidates(raw: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(caps) = FENCED_BLOCK.captures(raw) {
        candidates.push(caps[1].trim().to_string());
    }

    let stripped = raw.trim().trim_matches('`').trim();
    let stripped = stripped
        .strip_prefix("json")
        .or_else(|| stripped.strip_prefix("JSON"))
        .unwrap_or(stripped)
        .trim();
    if !candidates.iter().any(|c| c == stripped) {
        candidates.push(stripped.to_string());
    }

    candidates
}

/// Salvage `{response, classification}` objects from broken output
fn recover_pairs(raw: &str) -> Vec<Value> {
    let mut objects = Vec::new();
    collect_objects(raw, 0, &mut objects);
    objects
        .into_iter()
        .filter(|value| {
            value.as_object().is_some_and(|obj| {
                has_key(obj, RESPONSE_KEY) && has_key(obj, CLASSIFICATION_KEY)
            })
        })
        .collect()
}

/// Same nesting limit serde_json applies when parsing
const MAX_RECOVERY_DEPTH: usize = 128;

fn collect_objects(text: &str, level: usize, out: &mut Vec<Value>) {
    if level >= MAX_RECOVERY_DEPTH {
        return;
    }

    let scan = scan_objects(text);
    for candidate in scan.closed {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => out.push(value),
            // A broken object may have swallowed well-formed ones
            _ => collect_objects(&candidate[1..candidate.len() - 1], level + 1, out),
        }
    }

    // An object missing its closing brace swallows everything after it
    if let Some(tail) = scan.unclosed {
        collect_objects(&tail[1..], level + 1, out);
    }
}

/// Result of scanning text for top-level `{...}` spans
#[derive(Debug, Default, PartialEq)]
struct ObjectScan<'a> {
    /// Spans whose braces balanced, in text order
    closed: Vec<&'a str>,
    /// Text from the last `{` that never closed, if any
    unclosed: Option<&'a str>,
}

/// Outermost `{...}` spans, ignoring braces inside JSON strings
fn scan_objects(text: &str) -> ObjectScan<'_> {
    let mut scan = ObjectScan::default();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    scan.closed.push(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        scan.unclosed = Some(&text[start..]);
    }
    scan
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn has_key(obj: &Map<String, Value>, key: &str) -> bool {
    obj.keys().any(|k| normalize_key(k) == key)
}

/// First value whose key matches one of `keys`, in `keys` order
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|wanted| {
        obj.iter()
            .find(|(k, _)| normalize_key(k) == *wanted)
            .map(|(_, v)| v)
    })
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Response text as compared between batch and model echo
fn comparable(text: &str) -> String {
    ITEM_LABEL.replace(text.trim(), "").trim().to_string()
}
