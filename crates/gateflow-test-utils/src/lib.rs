//! Shared test utilities for gateflow.
//!
//! Scripted agents and answer sources that stand in for the LLM and the
//! human reviewer, plus config fixtures.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};

use gateflow_core::config::AppConfig;
use gateflow_core::error::{GateflowError, Result};
use gateflow_core::event::PendingRequest;
use gateflow_core::traits::{Agent, AnswerSource, Feedback};
use gateflow_core::types::{AgentDelta, AgentReply, Conversation};

/// Agent that replays scripted replies and records every conversation it receives.
///
/// Once the script runs out it answers `"<name> reply <n>"`.
pub struct MockAgent {
    name: String,
    replies: Mutex<VecDeque<AgentReply>>,
    calls: Mutex<Vec<Conversation>>,
    streaming: bool,
}

impl MockAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            streaming: false,
        }
    }

    /// Plain-text replies, in order.
    pub fn with_replies<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agent = Self::new(name);
        for reply in replies {
            agent.push_reply(AgentReply::text(reply));
        }
        agent
    }

    /// Queue one more reply.
    pub fn with_reply(self, reply: AgentReply) -> Self {
        self.push_reply(reply);
        self
    }

    /// Emit each word of the reply as a text delta before finishing.
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    fn push_reply(&self, reply: AgentReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Conversations received so far, one per invocation.
    pub fn calls(&self) -> Vec<Conversation> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// The conversation of the most recent invocation.
    pub fn last_call(&self) -> Option<Conversation> {
        lock(&self.calls).last().cloned()
    }
}

impl Agent for MockAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_stream(
        &self,
        messages: Conversation,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<AgentDelta>>>> {
        let n = {
            let mut calls = lock(&self.calls);
            calls.push(messages);
            calls.len()
        };
        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| AgentReply::text(format!("{} reply {}", self.name, n)));

        let mut deltas = Vec::new();
        if self.streaming {
            let words: Vec<&str> = reply.text.split_inclusive(' ').collect();
            deltas.extend(words.into_iter().map(|w| Ok(AgentDelta::Text(w.to_string()))));
        }
        deltas.push(Ok(AgentDelta::Done(reply)));

        Box::pin(async move { Ok(stream::iter(deltas).boxed()) })
    }
}

/// Agent that always fails.
pub struct FailingAgent {
    name: String,
    message: String,
    mid_stream: bool,
}

impl FailingAgent {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            mid_stream: false,
        }
    }

    /// Start streaming text, then fail before finishing.
    pub fn mid_stream(mut self) -> Self {
        self.mid_stream = true;
        self
    }
}

impl Agent for FailingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_stream(
        &self,
        _messages: Conversation,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<AgentDelta>>>> {
        let err = GateflowError::LlmRequest(self.message.clone());
        if !self.mid_stream {
            return Box::pin(async move { Err(err) });
        }
        let items = vec![Ok(AgentDelta::Text("partial ".to_string())), Err(err)];
        Box::pin(async move { Ok(stream::iter(items).boxed()) })
    }
}

/// Answer source that replays scripted answers, one per request.
///
/// `None` in the script abandons the batch it falls in.
pub struct ScriptedAnswers {
    script: Mutex<VecDeque<Option<String>>>,
    seen: Mutex<Vec<Vec<PendingRequest>>>,
}

impl ScriptedAnswers {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(answers.into_iter().map(|a| Some(a.into())).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Abandon once the scripted answers are used up.
    pub fn then_abandon(self) -> Self {
        lock(&self.script).push_back(None);
        self
    }

    /// Batches presented so far.
    pub fn batches(&self) -> Vec<Vec<PendingRequest>> {
        lock(&self.seen).clone()
    }
}

impl AnswerSource for ScriptedAnswers {
    fn answer<'a>(&'a self, requests: &'a [PendingRequest]) -> BoxFuture<'a, Result<Feedback>> {
        Box::pin(async move {
            lock(&self.seen).push(requests.to_vec());
            let mut script = lock(&self.script);
            let mut answers = HashMap::new();
            for request in requests {
                match script.pop_front() {
                    Some(Some(answer)) => {
                        answers.insert(request.request_id.clone(), answer);
                    }
                    Some(None) => return Ok(Feedback::Abandon),
                    None => {
                        return Err(GateflowError::InvalidState(format!(
                            "no scripted answer for request {}",
                            request.request_id
                        )))
                    }
                }
            }
            Ok(Feedback::Answers(answers))
        })
    }
}

/// Minimal config pointing at an unreachable local endpoint.
pub fn test_config() -> AppConfig {
    toml::from_str(
        r#"
[model]
provider = "openai"
model_id = "test-model"
base_url = "http://127.0.0.1:9/v1/chat/completions"
"#,
    )
    .expect("test config parses")
}

/// Write `content` to `gateflow.toml` in a fresh temp dir.
///
/// Keep the returned dir alive for as long as the file is needed.
pub fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("gateflow.toml");
    std::fs::write(&path, content).expect("write config");
    (dir, path)
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
