use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::event::PendingRequest;
use crate::types::*;

/// LLM client: OpenAI-compatible streaming chat completions.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        format: ResponseFormat,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Agent: opaque unit that answers a conversation.
///
/// The stream yields any number of `AgentDelta::Text` items followed by one
/// `AgentDelta::Done`. A stream that ends without `Done` is treated as a reply
/// made of the concatenated text deltas.
pub trait Agent: Send + Sync + 'static {
    /// Display name, used in logs.
    fn name(&self) -> &str;

    /// Run the agent over `messages`.
    fn run_stream(
        &self,
        messages: Conversation,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<AgentDelta>>>>;
}

/// Outcome of presenting a batch of pending requests to a human.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// One answer per `request_id`.
    Answers(HashMap<String, String>),
    /// The human gave up on the run.
    Abandon,
}

/// External answer source, the human side of a review gate.
pub trait AnswerSource: Send + Sync {
    /// Answer every request in `requests`, or abandon the batch.
    fn answer<'a>(&'a self, requests: &'a [PendingRequest]) -> BoxFuture<'a, Result<Feedback>>;
}
