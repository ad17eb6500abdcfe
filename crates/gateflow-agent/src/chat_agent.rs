use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

use gateflow_core::config::ModelConfig;
use gateflow_core::error::Result;
use gateflow_core::traits::{Agent, LlmClient};
use gateflow_core::types::{
    AgentDelta, AgentReply, ChatMessage, Conversation, ResponseFormat, StreamDelta,
};

/// An agent backed by a single streaming chat completion.
///
/// The instructions are sent as a system message ahead of the conversation.
/// In JSON mode the reply is also parsed into the structured payload.
pub struct ChatAgent {
    name: String,
    instructions: String,
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    format: ResponseFormat,
}

impl ChatAgent {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        model: ModelConfig,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            llm,
            model,
            format: ResponseFormat::Text,
        }
    }

    /// Ask the model for a JSON object reply.
    pub fn json(mut self) -> Self {
        self.format = ResponseFormat::JsonObject;
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }
}

struct ReplyState<'a> {
    deltas: BoxStream<'a, Result<StreamDelta>>,
    text: String,
    format: ResponseFormat,
    name: &'a str,
    done: bool,
}

impl Agent for ChatAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_stream(
        &self,
        messages: Conversation,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<AgentDelta>>>> {
        Box::pin(async move {
            let mut prompt = Vec::with_capacity(messages.len() + 1);
            if !self.instructions.is_empty() {
                prompt.push(ChatMessage::system(self.instructions.clone()));
            }
            prompt.extend(messages);
            debug!(agent = %self.name, messages = prompt.len(), format = ?self.format, "Calling model");

            let deltas = self.llm.chat_stream(&self.model, prompt, self.format).await?;
            let state = ReplyState {
                deltas,
                text: String::new(),
                format: self.format,
                name: &self.name,
                done: false,
            };

            let out = stream::unfold(state, |mut state| async move {
                if state.done {
                    return None;
                }
                while let Some(delta) = state.deltas.next().await {
                    match delta {
                        Ok(StreamDelta::TextDelta(text)) => {
                            state.text.push_str(&text);
                            return Some((Ok(AgentDelta::Text(text)), state));
                        }
                        Ok(StreamDelta::Stop(reason)) => {
                            debug!(agent = %state.name, ?reason, "Model stopped");
                        }
                        Ok(StreamDelta::Usage {
                            input_tokens,
                            output_tokens,
                        }) => {
                            debug!(agent = %state.name, input_tokens, output_tokens, "Token usage");
                        }
                        Err(e) => {
                            state.done = true;
                            return Some((Err(e), state));
                        }
                    }
                }
                state.done = true;
                let reply = finish_reply(state.name, std::mem::take(&mut state.text), state.format);
                Some((Ok(AgentDelta::Done(reply)), state))
            });

            Ok(out.boxed())
        })
    }
}

fn finish_reply(name: &str, text: String, format: ResponseFormat) -> AgentReply {
    let reply = AgentReply::text(text);
    if format != ResponseFormat::JsonObject {
        return reply;
    }
    match serde_json::from_str::<serde_json::Value>(reply.text.trim()) {
        Ok(value) => reply.with_structured(value),
        Err(e) => {
            warn!(agent = %name, error = %e, "JSON mode reply did not parse");
            reply
        }
    }
}
