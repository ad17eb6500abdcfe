//! Human review gate between a drafting agent and a final editing agent.
//!
//! The coordinator receives every response of the drafter and of the final
//! editor. Drafts are turned into [`PendingRequest`]s for a human; the human's
//! answer either approves the draft (forwarded to the final editor) or carries
//! revision guidance (sent back to the drafter). Responses from the final
//! editor become the run's output.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use gateflow_core::config::ReviewConfig;
use gateflow_core::error::{GateflowError, Result};
use gateflow_core::event::{DraftFeedbackRequest, PendingRequest};
use gateflow_core::types::{AgentRequest, AgentResponse, ChatMessage};

/// Where the coordinator stands in the review loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinatorPhase {
    #[default]
    WaitingForDraft,
    AwaitingHumanInput,
    /// Guidance was sent back; waiting for the redraft.
    Revising,
    /// Approved draft forwarded to the final editor.
    Forwarding,
    Completed,
}

/// Per-run mutable state of one coordinator node.
#[derive(Debug, Default)]
pub struct CoordinatorState {
    phase: CoordinatorPhase,
    pending: HashMap<String, PendingRequest>,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> CoordinatorPhase {
        self.phase
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingRequest> {
        self.pending.values()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// What the coordinator asks the run to do next.
#[derive(Debug, Clone)]
pub enum CoordinatorAction {
    /// Suspend until a human answers this request.
    RequestInput(PendingRequest),
    /// Deliver a request to a downstream agent.
    Send { target: String, request: AgentRequest },
    /// Emit the run's terminal output.
    Yield(AgentResponse),
}

/// Definition of the review gate. Holds no run state and is reusable.
#[derive(Debug, Clone)]
pub struct ReviewCoordinator {
    drafter_id: String,
    final_id: String,
    review: ReviewConfig,
}

impl ReviewCoordinator {
    pub fn new(drafter_id: impl Into<String>, final_id: impl Into<String>) -> Self {
        Self {
            drafter_id: drafter_id.into(),
            final_id: final_id.into(),
            review: ReviewConfig::default(),
        }
    }

    pub fn with_review_config(mut self, review: ReviewConfig) -> Self {
        self.review = review;
        self
    }

    pub fn drafter_id(&self) -> &str {
        &self.drafter_id
    }

    pub fn final_id(&self) -> &str {
        &self.final_id
    }

    pub fn review_config(&self) -> &ReviewConfig {
        &self.review
    }

    /// Handle a response routed to the coordinator.
    ///
    /// The producer id decides the transition, whatever the current phase.
    pub fn handle_response(
        &self,
        node_id: &str,
        state: &mut CoordinatorState,
        response: AgentResponse,
    ) -> Vec<CoordinatorAction> {
        if response.producer_id == self.final_id {
            info!(node_id, producer = %response.producer_id, "Final response received, completing");
            state.phase = CoordinatorPhase::Completed;
            return vec![CoordinatorAction::Yield(response)];
        }

        if response.producer_id != self.drafter_id {
            warn!(
                node_id,
                producer = %response.producer_id,
                "Ignoring response from a producer the coordinator does not know"
            );
            return vec![];
        }

        let conversation = response.conversation();
        let draft = response.text.trim();
        let draft_text = if draft.is_empty() {
            debug!(node_id, "Empty draft, substituting placeholder");
            self.review.draft_placeholder.clone()
        } else {
            draft.to_string()
        };

        let request = PendingRequest::new(
            node_id,
            DraftFeedbackRequest {
                prompt: self.review.reviewer_prompt.clone(),
                draft_text,
                conversation,
            },
        );
        if !state.pending.is_empty() {
            debug!(node_id, open = state.pending.len(), "Draft arrived while another review is open");
        }
        info!(node_id, request_id = %request.request_id, "Requesting human feedback on draft");
        state.pending.insert(request.request_id.clone(), request.clone());
        state.phase = CoordinatorPhase::AwaitingHumanInput;

        vec![CoordinatorAction::RequestInput(request)]
    }

    /// Handle the human's answer to one pending request.
    pub fn handle_answer(
        &self,
        state: &mut CoordinatorState,
        request_id: &str,
        answer: &str,
    ) -> Result<CoordinatorAction> {
        let request = state
            .pending
            .remove(request_id)
            .ok_or_else(|| GateflowError::UnknownRequest(request_id.to_string()))?;
        let mut messages = request.payload.conversation;

        if self.review.is_approval(answer) {
            info!(request_id, to = %self.final_id, "Draft approved, forwarding to final editor");
            messages.push(ChatMessage::user(self.review.approved_message.clone()));
            state.phase = CoordinatorPhase::Forwarding;
            return Ok(CoordinatorAction::Send {
                target: self.final_id.clone(),
                request: AgentRequest::respond(messages),
            });
        }

        info!(request_id, to = %self.drafter_id, "Revision requested, returning to drafter");
        messages.push(ChatMessage::user(self.review.revision_instruction(answer)));
        state.phase = CoordinatorPhase::Revising;
        Ok(CoordinatorAction::Send {
            target: self.drafter_id.clone(),
            request: AgentRequest::respond(messages),
        })
    }
}
