use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AgentResponse, Conversation};

/// Payload shown to the human reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftFeedbackRequest {
    /// Instructions for the reviewer.
    pub prompt: String,
    /// The draft under review. Never empty.
    pub draft_text: String,
    /// Conversation captured when the draft arrived.
    pub conversation: Conversation,
}

/// A suspended unit of work awaiting an external answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: String,
    /// Node id of the coordinator that issued the request.
    pub source_id: String,
    pub payload: DraftFeedbackRequest,
    pub created_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(source_id: impl Into<String>, payload: DraftFeedbackRequest) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Event emitted while a workflow run is driven.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Partial output from an agent. Informational only.
    AgentUpdate { producer_id: String, text: String },
    /// The run needs an external answer before it can continue.
    InputRequested(PendingRequest),
    /// Terminal output of the run.
    Output(AgentResponse),
}

impl WorkflowEvent {
    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output(_))
    }
}
