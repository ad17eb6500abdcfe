use std::sync::Arc;

use serde_json::json;

use gateflow_agent::workflows::{content_pipeline, EDITOR, PUBLISHER, SUMMARIZER};
use gateflow_agent::WorkflowDriver;
use gateflow_core::config::{QualityConfig, WorkflowConfig};
use gateflow_core::types::{AgentReply, ChatMessage};
use gateflow_test_utils::{MockAgent, ScriptedAnswers};

struct Pipeline {
    writer: Arc<MockAgent>,
    editor: Arc<MockAgent>,
    publisher: Arc<MockAgent>,
    summarizer: Arc<MockAgent>,
    driver: WorkflowDriver,
}

fn pipeline(review: AgentReply, quality: &QualityConfig) -> Pipeline {
    let writer = Arc::new(MockAgent::with_replies("writer", ["Remote retros work best when..."]));
    let reviewer = Arc::new(MockAgent::new("reviewer").with_reply(review));
    let editor = Arc::new(MockAgent::with_replies(EDITOR, ["Edited article"]));
    let publisher = Arc::new(MockAgent::with_replies(PUBLISHER, ["# Published article"]));
    let summarizer = Arc::new(MockAgent::with_replies(SUMMARIZER, ["Report: published"]));

    let graph = content_pipeline(
        writer.clone(),
        reviewer,
        editor.clone(),
        publisher.clone(),
        summarizer.clone(),
        quality,
    )
    .expect("valid graph");
    let driver = WorkflowDriver::new(
        Arc::new(graph),
        WorkflowConfig::default(),
        Arc::new(ScriptedAnswers::new(Vec::<String>::new())),
    );

    Pipeline {
        writer,
        editor,
        publisher,
        summarizer,
        driver,
    }
}

#[tokio::test]
async fn test_low_score_goes_through_editor() {
    let review = AgentReply::text(r#"{"score": 55, "feedback": "Needs concrete examples"}"#);
    let p = pipeline(review, &QualityConfig::default());

    let summary = p.driver.run("write about retros", |_, _| {}).await.expect("run completes");

    assert_eq!(summary.output.text, "Report: published");
    assert_eq!(summary.output.producer_id, SUMMARIZER);
    assert_eq!(summary.pauses, 0);
    assert_eq!(p.writer.call_count(), 1);
    assert_eq!(p.editor.call_count(), 1);
    assert_eq!(p.publisher.call_count(), 1);

    // The editor works from the full trace, including the review feedback
    let seen = p.editor.last_call().unwrap();
    assert_eq!(seen[0], ChatMessage::user("write about retros"));
    assert!(seen.last().unwrap().text.contains("Needs concrete examples"));
    assert!(p.publisher.last_call().unwrap().contains(&ChatMessage::assistant("Edited article")));
}

#[tokio::test]
async fn test_high_score_skips_editor() {
    let review = AgentReply::text("```json\n{\"score\": 88, \"feedback\": \"Solid\"}\n```");
    let p = pipeline(review, &QualityConfig::default());

    let summary = p.driver.run("write about retros", |_, _| {}).await.expect("run completes");

    assert_eq!(summary.output.text, "Report: published");
    assert_eq!(p.editor.call_count(), 0);
    assert_eq!(p.publisher.call_count(), 1);
    assert_eq!(p.summarizer.call_count(), 1);
}

#[tokio::test]
async fn test_malformed_review_skips_editor() {
    let review = AgentReply::text("I think this is pretty good overall.");
    let p = pipeline(review, &QualityConfig::default());

    p.driver.run("write about retros", |_, _| {}).await.expect("run completes");

    assert_eq!(p.editor.call_count(), 0);
    assert_eq!(p.publisher.call_count(), 1);
}

#[tokio::test]
async fn test_structured_review_and_custom_threshold() {
    let review = AgentReply::text("see payload").with_structured(json!({"score": 85, "feedback": "ok"}));
    let p = pipeline(review, &QualityConfig { approval_threshold: 90 });

    p.driver.run("write about retros", |_, _| {}).await.expect("run completes");

    assert_eq!(p.editor.call_count(), 1);
    assert_eq!(p.publisher.call_count(), 1);
}
