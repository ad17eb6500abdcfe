//! Drives a workflow run to completion across human pauses.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info};

use gateflow_core::config::WorkflowConfig;
use gateflow_core::error::{GateflowError, Result};
use gateflow_core::event::{PendingRequest, WorkflowEvent};
use gateflow_core::traits::{AnswerSource, Feedback};
use gateflow_core::types::{AgentResponse, RunId};

use crate::graph::{WorkflowGraph, WorkflowRun};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub output: AgentResponse,
    /// Number of times the run paused for input.
    pub pauses: usize,
}

/// Runs a graph, pausing for the answer source whenever input is requested.
pub struct WorkflowDriver {
    graph: Arc<WorkflowGraph>,
    config: WorkflowConfig,
    answers: Arc<dyn AnswerSource>,
}

impl WorkflowDriver {
    pub fn new(graph: Arc<WorkflowGraph>, config: WorkflowConfig, answers: Arc<dyn AnswerSource>) -> Self {
        Self {
            graph,
            config,
            answers,
        }
    }

    /// Run the graph on `input` until it yields an output.
    ///
    /// `on_update` receives `(producer_id, text)` for every streamed agent update.
    /// Each pause presents every request still open on the run, including
    /// ones an earlier batch left unanswered. Fails with `Aborted` if the
    /// answer source abandons a batch, and with `NoOutput` if the run goes
    /// quiet with nothing to answer.
    pub async fn run<F>(&self, input: &str, mut on_update: F) -> Result<RunSummary>
    where
        F: FnMut(&str, &str) + Send,
    {
        let mut run = WorkflowRun::new(Arc::clone(&self.graph), &self.config);
        let run_id = run.id().clone();
        let mut pauses = 0;

        let mut pass = drain(run.start(input)?, &mut on_update).await?;
        loop {
            if let Some(output) = pass.output {
                if !pass.requests.is_empty() {
                    debug!(run_id = %run_id, discarded = pass.requests.len(), "Discarding requests superseded by output");
                }
                info!(run_id = %run_id, pauses, "Run completed");
                return Ok(RunSummary {
                    run_id,
                    output,
                    pauses,
                });
            }
            let open: Vec<PendingRequest> = run.open_requests().into_iter().cloned().collect();
            if open.is_empty() {
                return Err(GateflowError::NoOutput);
            }

            pauses += 1;
            debug!(
                run_id = %run_id,
                new = pass.requests.len(),
                open = open.len(),
                "Collecting answers"
            );
            match self.answers.answer(&open).await? {
                Feedback::Abandon => {
                    run.abort();
                    return Err(GateflowError::Aborted);
                }
                Feedback::Answers(answers) => {
                    pass = drain(run.resume(answers)?, &mut on_update).await?;
                }
            }
        }
    }
}

/// Events collected from one streaming pass.
#[derive(Default)]
struct Pass {
    requests: Vec<PendingRequest>,
    output: Option<AgentResponse>,
}

async fn drain<F>(
    mut events: futures::stream::BoxStream<'_, Result<WorkflowEvent>>,
    on_update: &mut F,
) -> Result<Pass>
where
    F: FnMut(&str, &str) + Send,
{
    let mut pass = Pass::default();
    while let Some(event) = events.next().await {
        match event? {
            WorkflowEvent::AgentUpdate { producer_id, text } => on_update(&producer_id, &text),
            WorkflowEvent::InputRequested(request) => pass.requests.push(request),
            WorkflowEvent::Output(output) => {
                pass.output = Some(output);
                break;
            }
        }
    }
    Ok(pass)
}
