//! Quality gate predicates for routing reviewer responses.
//!
//! The reviewer agent answers with a JSON verdict carrying an integer `score`.
//! Scores at or above the threshold route to the approval branch, lower scores
//! route to revision. A response that cannot be read as a verdict fails open:
//! it is treated as approved and never as needing revision, so exactly one
//! branch fires for every reviewer response.

use serde::{Deserialize, Serialize};
use tracing::warn;

use gateflow_core::config::QualityConfig;
use gateflow_core::error::{GateflowError, Result};
use gateflow_core::types::AgentResponse;

/// Default approval threshold.
pub const DEFAULT_THRESHOLD: i64 = 80;

/// Structured verdict emitted by the reviewer.
///
/// Only `score` is required. A verdict that omits the feedback or the
/// sub-scores is still read and routed on its score; it does not fail open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub score: i64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub clarity: Option<i64>,
    #[serde(default)]
    pub completeness: Option<i64>,
    #[serde(default)]
    pub accuracy: Option<i64>,
    #[serde(default)]
    pub structure: Option<i64>,
}

/// Threshold-based routing predicates over reviewer responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityGate {
    threshold: i64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl QualityGate {
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(config.approval_threshold)
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Read the reviewer's verdict, preferring the structured payload over the text.
    pub fn evaluate(&self, response: &AgentResponse) -> Result<ReviewResult> {
        if let Some(value) = &response.structured {
            return serde_json::from_value(value.clone())
                .map_err(|e| GateflowError::PredicateEvaluation(e.to_string()));
        }
        serde_json::from_str(extract_json(&response.text))
            .map_err(|e| GateflowError::PredicateEvaluation(e.to_string()))
    }

    /// True when the score meets the threshold, or the verdict is unreadable.
    pub fn is_approved(&self, response: &AgentResponse) -> bool {
        match self.evaluate(response) {
            Ok(result) => result.score >= self.threshold,
            Err(e) => {
                warn!(producer = %response.producer_id, error = %e, "Unreadable review verdict, treating as approved");
                true
            }
        }
    }

    /// True only when a readable score falls below the threshold.
    pub fn needs_revision(&self, response: &AgentResponse) -> bool {
        match self.evaluate(response) {
            Ok(result) => result.score < self.threshold,
            Err(_) => false,
        }
    }
}

/// Extract JSON from a response that may contain markdown code fences.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                return after[..end].trim();
            }
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }
    trimmed
}
