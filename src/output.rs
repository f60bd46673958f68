//! Serialized run report

use crate::{
    controller::{ClassificationRun, ClassifiedResult, RunStats},
    planner::BatchingConfig,
    reconciler::{Sentiment, UnrecognizedLabelPolicy},
    ResponseShape,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat record handed to spreadsheet exporters, one per classified response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub response: String,
    pub category: String,
    pub subcategory: String,
    #[serde(rename = "type")]
    pub sentiment: Sentiment,
    pub explanation: String,
}

impl ExportRecord {
    /// Records for the classified results, in input order
    pub fn from_results(results: &[ClassifiedResult]) -> Vec<Self> {
        results
            .iter()
            .filter_map(|r| {
                r.classification.as_ref().map(|c| Self {
                    response: r.response.clone(),
                    category: c.category.clone(),
                    subcategory: c.subcategory.clone(),
                    sentiment: c.sentiment,
                    explanation: c.explanation.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub classified: usize,
    pub unclassified: usize,
    /// Classified responses per sentiment
    pub by_type: BTreeMap<String, usize>,
    /// Classified responses per category
    pub by_category: BTreeMap<String, usize>,
    pub requests: usize,
    pub successful_batches: usize,
    pub partial_failures: usize,
    pub hard_failures: usize,
    pub token_resizes: usize,
    pub single_item_fallbacks: usize,
    pub out_of_taxonomy: usize,
    pub error_sentinels: usize,
}

impl Summary {
    pub fn from_run(results: &[ClassifiedResult], stats: &RunStats) -> Self {
        let mut by_type = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        for c in results.iter().filter_map(|r| r.classification.as_ref()) {
            *by_type.entry(c.sentiment.to_string()).or_insert(0) += 1;
            *by_category.entry(c.category.clone()).or_insert(0) += 1;
        }

        Self {
            total: stats.total_responses,
            classified: stats.classified,
            unclassified: stats.unclassified,
            by_type,
            by_category,
            requests: stats.requests,
            successful_batches: stats.successful_batches,
            partial_failures: stats.partial_failures,
            hard_failures: stats.hard_failures,
            token_resizes: stats.token_resizes,
            single_item_fallbacks: stats.single_item_fallbacks,
            out_of_taxonomy: stats.out_of_taxonomy,
            error_sentinels: stats.error_sentinels,
        }
    }
}

/// Run parameters recorded alongside the results for reproducibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub model: String,
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batching: Option<BatchingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_unrecognized_label: Option<UnrecognizedLabelPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_shape: Option<ResponseShape>,
    pub latency_ms: u64,
    pub timestamp: String,
}

impl Metadata {
    /// Metadata for failures that happen before a configuration exists
    pub fn unavailable() -> Self {
        Self {
            model: "unknown".to_string(),
            api_url: "unknown".to_string(),
            provider: None,
            temperature: 0.0,
            max_tokens: None,
            seed: None,
            timeout_secs: 0,
            taxonomy_file: None,
            batching: None,
            on_unrecognized_label: None,
            response_shape: None,
            latency_ms: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Top-level JSON document written by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// "success" or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ExportRecord>>,
    /// Responses that could not be classified, in input order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unclassified_responses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub metadata: Metadata,
}

impl ClassificationReport {
    pub fn success(run: &ClassificationRun, metadata: Metadata) -> Self {
        Self {
            status: "success".to_string(),
            results: Some(ExportRecord::from_results(&run.results)),
            unclassified_responses: Some(
                run.results
                    .iter()
                    .filter(|r| r.classification.is_none())
                    .map(|r| r.response.clone())
                    .collect(),
            ),
            summary: Some(Summary::from_run(&run.results, &run.stats)),
            error: None,
            metadata,
        }
    }

    pub fn error(code: String, message: String, metadata: Metadata) -> Self {
        Self {
            status: "error".to_string(),
            results: None,
            unclassified_responses: None,
            summary: None,
            error: Some(ErrorInfo { code, message }),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Classification;

    fn classified(response: &str, sentiment: Sentiment, category: &str) -> ClassifiedResult {
        ClassifiedResult {
            response: response.to_string(),
            classification: Some(Classification {
                sentiment,
                category: category.to_string(),
                subcategory: "عام".to_string(),
                explanation: String::new(),
            }),
        }
    }

    fn sample_run() -> ClassificationRun {
        let results = vec![
            classified("a", Sentiment::Positive, "التدريس"),
            ClassifiedResult {
                response: "b".to_string(),
                classification: None,
            },
            classified("c", Sentiment::Negative, "التدريس"),
            classified("d", Sentiment::Negative, "المرافق"),
        ];
        let stats = RunStats {
            total_responses: 4,
            classified: 3,
            unclassified: 1,
            requests: 2,
            ..RunStats::default()
        };
        ClassificationRun { results, stats }
    }

    #[test]
    fn test_export_records_skip_unclassified() {
        let run = sample_run();
        let records = ExportRecord::from_results(&run.results);
        let responses: Vec<_> = records.iter().map(|r| r.response.as_str()).collect();
        assert_eq!(responses, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_export_record_serializes_type_key() {
        let run = sample_run();
        let records = ExportRecord::from_results(&run.results);
        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["type"], "positive");
        assert_eq!(json["category"], "التدريس");
        assert!(json.get("sentiment").is_none());
    }

    #[test]
    fn test_summary_counts() {
        let run = sample_run();
        let summary = Summary::from_run(&run.results, &run.stats);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.unclassified, 1);
        assert_eq!(summary.by_type["negative"], 2);
        assert_eq!(summary.by_type["positive"], 1);
        assert_eq!(summary.by_category["التدريس"], 2);
        assert_eq!(summary.requests, 2);
    }

    #[test]
    fn test_success_report_lists_unclassified() {
        let report = ClassificationReport::success(&sample_run(), Metadata::unavailable());
        assert_eq!(report.status, "success");
        assert_eq!(report.unclassified_responses, Some(vec!["b".to_string()]));
        assert!(report.error.is_none());
    }

    #[test]
    fn test_error_report_shape() {
        let report = ClassificationReport::error(
            "CONFIGURATION_ERROR".to_string(),
            "taxonomy missing".to_string(),
            Metadata::unavailable(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["code"], "CONFIGURATION_ERROR");
        assert!(json.get("results").is_none());
        assert_eq!(json["metadata"]["model"], "unknown");
    }
}
