//! Ready-made workflow graphs.

use std::sync::Arc;

use gateflow_core::config::{QualityConfig, ReviewConfig};
use gateflow_core::error::Result;
use gateflow_core::traits::Agent;

use crate::coordinator::ReviewCoordinator;
use crate::graph::{WorkflowBuilder, WorkflowGraph};
use crate::quality::QualityGate;

pub const WRITER: &str = "writer";
pub const COORDINATOR: &str = "coordinator";
pub const FINAL_EDITOR: &str = "final_editor";

pub const REVIEWER: &str = "reviewer";
pub const EDITOR: &str = "editor";
pub const PUBLISHER: &str = "publisher";
pub const SUMMARIZER: &str = "summarizer";

pub const REVIEW_WRITER_INSTRUCTIONS: &str = "You are a marketing writer. \
    Summarize the key product facts from the request as bullet points, \
    then produce a 3-sentence draft.";

pub const REVIEW_FINAL_EDITOR_INSTRUCTIONS: &str = "You are an editor who polishes marketing copy after human approval. \
    Correct any legal or factual issues. Return the final version even if no changes are needed.";

pub const PIPELINE_WRITER_INSTRUCTIONS: &str = "You are an excellent content writer. \
    Create clear, engaging content based on the user's request. \
    Focus on clarity, accuracy, and proper structure.";

pub const PIPELINE_REVIEWER_INSTRUCTIONS: &str = "You are an expert content reviewer. \
    Evaluate the writer's content based on:\n\
    1. Clarity - Is it easy to understand?\n\
    2. Completeness - Does it fully address the topic?\n\
    3. Accuracy - Is the information correct?\n\
    4. Structure - Is it well organized?\n\n\
    Return a JSON object with:\n\
    - score: overall quality (0-100)\n\
    - feedback: concise, actionable feedback\n\
    - clarity, completeness, accuracy, structure: individual scores (0-100)";

pub const PIPELINE_EDITOR_INSTRUCTIONS: &str = "You are a skilled editor. \
    You will receive content along with review feedback. \
    Improve the content by addressing every issue raised in the feedback. \
    Keep the original intent while improving clarity, completeness, accuracy, and structure.";

pub const PIPELINE_PUBLISHER_INSTRUCTIONS: &str = "You are a publishing agent. \
    You receive approved or edited content. \
    Format the content for publication with proper headings and structure.";

pub const PIPELINE_SUMMARIZER_INSTRUCTIONS: &str = "You are a summarizer agent. \
    Create a final publication report that includes:\n\
    1. A short summary of the published content\n\
    2. The workflow path taken (direct approval or edited)\n\
    3. Highlights and key takeaways\n\
    Keep it concise and professional.";

/// Drafter and final editor joined through a human review gate.
///
/// `writer -> coordinator -> (writer | final_editor) -> coordinator -> output`.
pub fn review_workflow(
    writer: Arc<dyn Agent>,
    final_editor: Arc<dyn Agent>,
    review: &ReviewConfig,
) -> Result<WorkflowGraph> {
    let coordinator = ReviewCoordinator::new(WRITER, FINAL_EDITOR).with_review_config(review.clone());
    WorkflowBuilder::new()
        .add_agent(WRITER, writer)
        .add_agent(FINAL_EDITOR, final_editor)
        .add_coordinator(COORDINATOR, coordinator)
        .set_start(WRITER)
        .add_edge(WRITER, COORDINATOR)
        .add_edge(COORDINATOR, WRITER)
        .add_edge(FINAL_EDITOR, COORDINATOR)
        .add_edge(COORDINATOR, FINAL_EDITOR)
        .build()
}

/// Quality-gated content pipeline.
///
/// High-scoring reviews go straight to the publisher; low scores go through
/// the editor first. Both paths end at the summarizer, which emits the output.
pub fn content_pipeline(
    writer: Arc<dyn Agent>,
    reviewer: Arc<dyn Agent>,
    editor: Arc<dyn Agent>,
    publisher: Arc<dyn Agent>,
    summarizer: Arc<dyn Agent>,
    quality: &QualityConfig,
) -> Result<WorkflowGraph> {
    let gate = QualityGate::from_config(quality);
    WorkflowBuilder::new()
        .add_agent(WRITER, writer)
        .add_agent(REVIEWER, reviewer)
        .add_agent(EDITOR, editor)
        .add_agent(PUBLISHER, publisher)
        .add_output_agent(SUMMARIZER, summarizer)
        .set_start(WRITER)
        .add_edge(WRITER, REVIEWER)
        .add_conditional_edge(REVIEWER, PUBLISHER, move |r| gate.is_approved(r))
        .add_conditional_edge(REVIEWER, EDITOR, move |r| gate.needs_revision(r))
        .add_edge(EDITOR, PUBLISHER)
        .add_edge(PUBLISHER, SUMMARIZER)
        .build()
}
