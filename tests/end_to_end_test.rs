// End-to-end classification against mocked model endpoints
//
// Runs the full library path: prompt building, provider request, batch
// controller and reconciliation, down to the serialized report.

use experience_classifier::{
    classify_responses, config_builder::ConfigBuilder, RunConfig, Sentiment, Taxonomy,
};
use mockito::{Matcher, Server};
use serde_json::json;

fn taxonomy() -> Taxonomy {
    Taxonomy::from_yaml(
        "types: [إيجابي, سلبي, محايد]\ncategories:\n  التدريس: [جودة الشرح]\n  المرافق: [القاعات]\n",
    )
    .unwrap()
}

fn responses() -> Vec<String> {
    vec![
        "الشرح ممتاز".to_string(),
        "القاعات مزدحمة".to_string(),
        "لا تعليق".to_string(),
    ]
}

fn config(api_url: String, api_key: Option<&str>) -> RunConfig {
    let mut builder = ConfigBuilder::new()
        .api_url(api_url)
        .model("test-model")
        .timeout_secs(5)
        .taxonomy(taxonomy());
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    builder.build().unwrap()
}

const MODEL_REPLY: &str = r#"```json
[
  {"التصنيف": "التدريس", "التصنيف_فرعي": "جودة الشرح", "نوع": "إيجابي", "تفسير": "مدح"},
  {"التصنيف": "المرافق", "التصنيف_فرعي": "القاعات", "نوع": "سلبية", "تفسير": "ازدحام"},
  {"التصنيف": "عام", "التصنيف_فرعي": "أخرى", "نوع": "محايد", "تفسير": "لا رأي"}
]
```"#;

#[tokio::test]
async fn test_ollama_run_classifies_all_responses() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::Regex("Please classify these 3 responses".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"model": "test-model", "response": MODEL_REPLY, "done": true}).to_string())
        .expect(1)
        .create_async()
        .await;

    let config = config(server.url() + "/api/generate", None);
    let report = classify_responses(&config, &responses()).await.unwrap();

    assert_eq!(report.status, "success");
    let results = report.results.as_ref().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].response, "الشرح ممتاز");
    assert_eq!(results[0].category, "التدريس");
    assert_eq!(results[1].sentiment, Sentiment::Negative);
    assert_eq!(results[2].sentiment, Sentiment::Neutral);

    let summary = report.summary.as_ref().unwrap();
    assert_eq!(summary.classified, 3);
    assert_eq!(summary.requests, 1);
    // "عام / أخرى" is not in the taxonomy but is kept
    assert_eq!(summary.out_of_taxonomy, 1);
    assert!(report.unclassified_responses.as_ref().unwrap().is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][1]["type"], "negative");
    assert_eq!(json["metadata"]["provider"], "ollama");
    assert_eq!(json["metadata"]["model"], "test-model");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_service_failures_are_absorbed() {
    let mut server = Server::new_async().await;
    // One batch request plus one request per response
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": {"message": "Incorrect API key"}}"#)
        .expect(3)
        .create_async()
        .await;

    let config = config(server.url() + "/v1/chat/completions", Some("bad-key"));
    let input = vec!["a".to_string(), "b".to_string()];
    let report = classify_responses(&config, &input).await.unwrap();

    assert_eq!(report.status, "success");
    assert!(report.results.as_ref().unwrap().is_empty());
    assert_eq!(report.unclassified_responses.as_ref().unwrap(), &input);
    let summary = report.summary.as_ref().unwrap();
    assert_eq!(summary.unclassified, 2);
    assert_eq!(summary.hard_failures, 1);
    assert_eq!(summary.single_item_fallbacks, 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_short_reply_falls_back_for_missing_item() {
    let mut server = Server::new_async().await;
    let reply = r#"[{"type": "positive", "category": "التدريس", "subcategory": "جودة الشرح", "explanation": "x"},
                    {"type": "negative", "category": "المرافق", "subcategory": "القاعات", "explanation": "y"}]"#;
    let body = json!({"candidates": [{"content": {"role": "model", "parts": [{"text": reply}]}}]});
    let mock = server
        .mock("POST", "/v1beta/models/test-model:generateContent")
        .match_header("x-goog-api-key", "gem-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(2)
        .create_async()
        .await;

    let config = config(server.url() + "/v1beta/models/test-model:generateContent", Some("gem-key"));
    let report = classify_responses(&config, &responses()).await.unwrap();

    let summary = report.summary.as_ref().unwrap();
    assert_eq!(summary.classified, 3);
    assert_eq!(summary.partial_failures, 1);
    assert_eq!(summary.requests, 2);
    // The single-item call answers with the first object of the reply
    assert_eq!(
        report.results.as_ref().unwrap()[2].sentiment,
        Sentiment::Positive
    );

    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_input_makes_no_requests() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .expect(0)
        .create_async()
        .await;

    let config = config(server.url() + "/api/generate", None);
    let report = classify_responses(&config, &[]).await.unwrap();

    assert_eq!(report.summary.as_ref().unwrap().total, 0);
    mock.assert_async().await;
}
