use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use futures::channel::mpsc;
use futures::future::{self, join_all, BoxFuture, Either, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, error, info, warn};

use gateflow_core::config::WorkflowConfig;
use gateflow_core::error::{GateflowError, Result};
use gateflow_core::event::{PendingRequest, WorkflowEvent};
use gateflow_core::traits::Agent;
use gateflow_core::types::{
    AgentDelta, AgentReply, AgentRequest, AgentResponse, ChatMessage, Conversation, RunId,
};

use super::node::NodeKind;
use super::WorkflowGraph;
use crate::coordinator::{CoordinatorAction, CoordinatorState};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Created,
    Running,
    AwaitingInput,
    Completed,
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::AwaitingInput => "awaiting_input",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    /// True once the run can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
enum Envelope {
    Request(AgentRequest),
    Response(AgentResponse),
}

/// A message waiting to be delivered in the next superstep.
#[derive(Debug)]
struct Delivery {
    target: String,
    envelope: Envelope,
}

/// Result of one agent invocation within a superstep.
struct Invocation {
    node_id: String,
    input: Conversation,
    reply: AgentReply,
}

/// The superstep currently executing.
struct InFlight {
    results: BoxFuture<'static, Vec<Result<Invocation>>>,
    finished: Option<Vec<Result<Invocation>>>,
    /// Text deltas per invocation, released one producer at a time in invocation order.
    updates: VecDeque<(String, mpsc::UnboundedReceiver<String>)>,
    coordinator_inbox: Vec<(String, AgentResponse)>,
}

impl InFlight {
    /// Next text delta as it arrives, or `None` once every invocation has
    /// finished and all of its deltas were released.
    async fn next_update(&mut self) -> Option<WorkflowEvent> {
        loop {
            let Some((producer_id, updates)) = self.updates.front_mut() else {
                if self.finished.is_none() {
                    self.finished = Some((&mut self.results).await);
                }
                return None;
            };
            let text = if self.finished.is_some() {
                updates.next().await
            } else {
                match future::select(updates.next(), &mut self.results).await {
                    Either::Left((text, _)) => text,
                    Either::Right((results, _)) => {
                        self.finished = Some(results);
                        continue;
                    }
                }
            };
            match text {
                Some(text) => {
                    return Some(WorkflowEvent::AgentUpdate {
                        producer_id: producer_id.clone(),
                        text,
                    })
                }
                None => {
                    self.updates.pop_front();
                }
            }
        }
    }
}

/// One execution of a [`WorkflowGraph`].
///
/// Messages sent during superstep N are delivered in superstep N+1. Agent
/// deliveries of a superstep run concurrently and their text deltas stream
/// out as they arrive, grouped per producer; coordinator deliveries are
/// handled on the driving task once the agents are done. The run pauses when it goes quiet with open
/// human requests, and completes on the first terminal output.
pub struct WorkflowRun {
    graph: Arc<WorkflowGraph>,
    id: RunId,
    status: RunStatus,
    max_supersteps: usize,
    supersteps: usize,
    queue: Vec<Delivery>,
    inflight: Option<InFlight>,
    buffer: VecDeque<WorkflowEvent>,
    coordinators: HashMap<String, CoordinatorState>,
    /// (request_id, coordinator node id) in the order requests were opened.
    open_requests: Vec<(String, String)>,
}

impl WorkflowRun {
    pub fn new(graph: Arc<WorkflowGraph>, config: &WorkflowConfig) -> Self {
        Self {
            graph,
            id: RunId::new(),
            status: RunStatus::Created,
            max_supersteps: config.max_supersteps,
            supersteps: 0,
            queue: Vec::new(),
            inflight: None,
            buffer: VecDeque::new(),
            coordinators: HashMap::new(),
            open_requests: Vec::new(),
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Supersteps executed so far, across all pause/resume cycles.
    pub fn supersteps(&self) -> usize {
        self.supersteps
    }

    /// Requests awaiting an answer, in the order they were opened.
    pub fn open_requests(&self) -> Vec<&PendingRequest> {
        self.open_requests
            .iter()
            .filter_map(|(request_id, coordinator_id)| {
                self.coordinators
                    .get(coordinator_id)?
                    .pending()
                    .find(|r| &r.request_id == request_id)
            })
            .collect()
    }

    /// Start the run with `input` as the first user message.
    pub fn start(
        &mut self,
        input: impl Into<String>,
    ) -> Result<BoxStream<'_, Result<WorkflowEvent>>> {
        if self.status != RunStatus::Created {
            return Err(GateflowError::InvalidState(format!(
                "cannot start a run that is {}",
                self.status
            )));
        }
        let start = self.graph.start().to_string();
        info!(run_id = %self.id, start = %start, "Run started");
        self.queue.push(Delivery {
            target: start,
            envelope: Envelope::Request(AgentRequest::respond(vec![ChatMessage::user(input)])),
        });
        self.status = RunStatus::Running;
        Ok(self.event_stream())
    }

    /// Resume a paused run with answers keyed by `request_id`.
    ///
    /// Answers are applied in the order the requests were opened. Requests
    /// without an answer stay open.
    pub fn resume(
        &mut self,
        answers: HashMap<String, String>,
    ) -> Result<BoxStream<'_, Result<WorkflowEvent>>> {
        if self.status != RunStatus::AwaitingInput {
            return Err(GateflowError::InvalidState(format!(
                "cannot resume a run that is {}",
                self.status
            )));
        }
        if let Some(unknown) = answers
            .keys()
            .find(|id| !self.open_requests.iter().any(|(open, _)| open == *id))
        {
            return Err(GateflowError::UnknownRequest(unknown.clone()));
        }

        info!(run_id = %self.id, answers = answers.len(), "Run resumed");
        let graph = Arc::clone(&self.graph);
        let open = std::mem::take(&mut self.open_requests);
        for (request_id, coordinator_id) in open {
            let Some(answer) = answers.get(&request_id) else {
                self.open_requests.push((request_id, coordinator_id));
                continue;
            };
            let Some(NodeKind::Coordinator(coordinator)) =
                graph.node(&coordinator_id).map(|n| &n.kind)
            else {
                return Err(GateflowError::InvalidState(format!(
                    "request {} belongs to unknown coordinator '{}'",
                    request_id, coordinator_id
                )));
            };
            let state = self.coordinators.entry(coordinator_id.clone()).or_default();
            let action = coordinator.handle_answer(state, &request_id, answer)?;
            self.apply_action(&coordinator_id, action);
        }

        self.status = RunStatus::Running;
        Ok(self.event_stream())
    }

    /// Abandon the run, discarding all in-flight state.
    pub fn abort(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        info!(run_id = %self.id, open_requests = self.open_requests.len(), "Run aborted");
        self.status = RunStatus::Aborted;
        self.discard();
    }

    fn event_stream(&mut self) -> BoxStream<'_, Result<WorkflowEvent>> {
        stream::unfold(self, |run| async move {
            match run.next_event().await {
                Ok(Some(event)) => Some((Ok(event), run)),
                Ok(None) => None,
                Err(e) => Some((Err(e), run)),
            }
        })
        .boxed()
    }

    async fn next_event(&mut self) -> Result<Option<WorkflowEvent>> {
        loop {
            if let Some(event) = self.buffer.pop_front() {
                return Ok(Some(event));
            }
            if let Some(inflight) = self.inflight.as_mut() {
                if let Some(update) = inflight.next_update().await {
                    return Ok(Some(update));
                }
                if let Some(inflight) = self.inflight.take() {
                    if let Err(e) = self.complete_superstep(inflight) {
                        return Err(self.fail(e));
                    }
                }
                continue;
            }
            if self.status != RunStatus::Running {
                return Ok(None);
            }
            if self.queue.is_empty() {
                return self.settle().map(|_| None);
            }
            if let Err(e) = self.begin_superstep() {
                return Err(self.fail(e));
            }
        }
    }

    fn fail(&mut self, e: GateflowError) -> GateflowError {
        error!(run_id = %self.id, error = %e, "Run failed");
        self.status = RunStatus::Failed;
        self.discard();
        e
    }

    /// Called when no deliveries remain.
    fn settle(&mut self) -> Result<()> {
        if self.open_requests.is_empty() {
            warn!(run_id = %self.id, "Run went idle without output");
            self.status = RunStatus::Failed;
            self.discard();
            return Err(GateflowError::NoOutput);
        }
        info!(
            run_id = %self.id,
            open_requests = self.open_requests.len(),
            "Run paused awaiting input"
        );
        self.status = RunStatus::AwaitingInput;
        Ok(())
    }

    /// Dispatch the queued deliveries: agents start running, coordinator
    /// deliveries wait until the agents are done.
    fn begin_superstep(&mut self) -> Result<()> {
        self.supersteps += 1;
        if self.supersteps > self.max_supersteps {
            return Err(GateflowError::MaxSuperstepsExceeded(self.max_supersteps));
        }

        let deliveries = std::mem::take(&mut self.queue);
        debug!(
            run_id = %self.id,
            superstep = self.supersteps,
            deliveries = deliveries.len(),
            "Running superstep"
        );

        let graph = Arc::clone(&self.graph);
        let mut invocations = Vec::new();
        let mut updates = VecDeque::new();
        let mut coordinator_inbox = Vec::new();
        for delivery in deliveries {
            let Some(node) = graph.node(&delivery.target) else {
                warn!(to = %delivery.target, "Dropping delivery to unknown node");
                continue;
            };
            match (&node.kind, delivery.envelope) {
                (NodeKind::Agent(_), Envelope::Request(request)) if !request.should_respond => {
                    debug!(node_id = %node.id, "Request does not ask for a response, skipping");
                }
                (NodeKind::Agent(agent), envelope) => {
                    let input = match envelope {
                        Envelope::Request(request) => request.messages,
                        Envelope::Response(response) => response.conversation(),
                    };
                    let (tx, rx) = mpsc::unbounded();
                    updates.push_back((node.id.clone(), rx));
                    invocations.push(invoke(node.id.clone(), Arc::clone(agent), input, tx));
                }
                (NodeKind::Coordinator(_), Envelope::Response(response)) => {
                    coordinator_inbox.push((node.id.clone(), response));
                }
                (NodeKind::Coordinator(_), Envelope::Request(_)) => {
                    warn!(node_id = %node.id, "Coordinator received a request, ignoring");
                }
            }
        }

        self.inflight = Some(InFlight {
            results: join_all(invocations).boxed(),
            finished: None,
            updates,
            coordinator_inbox,
        });
        Ok(())
    }

    /// Route the finished invocations, then let coordinators react.
    fn complete_superstep(&mut self, inflight: InFlight) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let results = inflight.finished.unwrap_or_default();
        let mut responses = Vec::with_capacity(results.len());
        for result in results {
            let invocation = result?;
            responses.push(AgentResponse::from_reply(
                invocation.node_id,
                &invocation.input,
                invocation.reply,
            ));
        }

        for response in responses {
            let emits_output = graph
                .node(&response.producer_id)
                .is_some_and(|n| n.emit_output);
            for target in graph.route(&response.producer_id, &response) {
                self.queue.push(Delivery {
                    target,
                    envelope: Envelope::Response(response.clone()),
                });
            }
            if emits_output {
                self.finish(response);
                return Ok(());
            }
        }

        for (node_id, response) in inflight.coordinator_inbox {
            let Some(NodeKind::Coordinator(coordinator)) = graph.node(&node_id).map(|n| &n.kind)
            else {
                continue;
            };
            let state = self.coordinators.entry(node_id.clone()).or_default();
            for action in coordinator.handle_response(&node_id, state, response) {
                self.apply_action(&node_id, action);
                if self.status != RunStatus::Running {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    fn apply_action(&mut self, coordinator_id: &str, action: CoordinatorAction) {
        match action {
            CoordinatorAction::RequestInput(request) => {
                info!(
                    run_id = %self.id,
                    node_id = coordinator_id,
                    request_id = %request.request_id,
                    "Input requested"
                );
                self.open_requests
                    .push((request.request_id.clone(), coordinator_id.to_string()));
                self.buffer.push_back(WorkflowEvent::InputRequested(request));
            }
            CoordinatorAction::Send { target, request } => {
                if !self.graph.has_edge(coordinator_id, &target) {
                    warn!(node_id = coordinator_id, to = %target, "No edge for targeted send, dropping");
                    return;
                }
                debug!(node_id = coordinator_id, to = %target, "Coordinator sending request");
                self.queue.push(Delivery {
                    target,
                    envelope: Envelope::Request(request),
                });
            }
            CoordinatorAction::Yield(response) => self.finish(response),
        }
    }

    /// Emit the terminal output and complete the run.
    fn finish(&mut self, output: AgentResponse) {
        info!(run_id = %self.id, producer = %output.producer_id, "Output emitted");
        self.buffer.push_back(WorkflowEvent::Output(output));
        self.status = RunStatus::Completed;
        self.queue.clear();
        self.open_requests.clear();
        self.coordinators.clear();
    }

    fn discard(&mut self) {
        self.inflight = None;
        self.queue.clear();
        self.buffer.clear();
        self.open_requests.clear();
        self.coordinators.clear();
    }
}

/// Invoke one agent, forwarding text deltas to `updates` and collecting the reply.
async fn invoke(
    node_id: String,
    agent: Arc<dyn Agent>,
    input: Conversation,
    updates: mpsc::UnboundedSender<String>,
) -> Result<Invocation> {
    debug!(node_id = %node_id, agent = agent.name(), messages = input.len(), "Invoking agent");
    let mut stream = agent
        .run_stream(input.clone())
        .await
        .map_err(|e| GateflowError::agent(&node_id, e))?;

    let mut streamed = String::new();
    let mut reply = None;
    while let Some(delta) = stream.next().await {
        match delta.map_err(|e| GateflowError::agent(&node_id, e))? {
            AgentDelta::Text(text) => {
                streamed.push_str(&text);
                let _ = updates.unbounded_send(text);
            }
            AgentDelta::Done(done) => {
                reply = Some(done);
                break;
            }
        }
    }
    drop(stream);

    let reply = reply.unwrap_or_else(|| AgentReply::text(streamed));
    Ok(Invocation {
        node_id,
        input,
        reply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ReviewCoordinator;
    use crate::graph::WorkflowBuilder;
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::channel::oneshot;
    use futures::TryStreamExt;
    use gateflow_test_utils::{FailingAgent, MockAgent};

    /// Streams one word, then holds its reply until the gate opens.
    struct GatedAgent {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl Agent for GatedAgent {
        fn name(&self) -> &str {
            "gated"
        }

        fn run_stream(
            &self,
            _messages: Conversation,
        ) -> BoxFuture<'_, Result<BoxStream<'_, Result<AgentDelta>>>> {
            let gate = self.gate.lock().unwrap().take();
            Box::pin(async move {
                let first = stream::iter(vec![Ok(AgentDelta::Text("first ".to_string()))]);
                let rest = stream::once(async move {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    Ok(AgentDelta::Done(AgentReply::text("first last")))
                });
                Ok(first.chain(rest).boxed())
            })
        }
    }

    fn review_graph(writer: Arc<MockAgent>, editor: Arc<MockAgent>) -> Arc<WorkflowGraph> {
        Arc::new(
            WorkflowBuilder::new()
                .add_agent("writer", writer)
                .add_agent("editor", editor)
                .add_coordinator("coordinator", ReviewCoordinator::new("writer", "editor"))
                .add_edge("writer", "coordinator")
                .add_edge("coordinator", "writer")
                .add_edge("editor", "coordinator")
                .add_edge("coordinator", "editor")
                .set_start("writer")
                .build()
                .unwrap(),
        )
    }

    fn requests(events: &[WorkflowEvent]) -> Vec<PendingRequest> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::InputRequested(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    fn outputs(events: &[WorkflowEvent]) -> Vec<AgentResponse> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::Output(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_draft_pauses_for_input() {
        let writer = Arc::new(MockAgent::with_replies("writer", ["D1"]));
        let editor = Arc::new(MockAgent::with_replies("editor", ["E1"]));
        let mut run = WorkflowRun::new(review_graph(writer.clone(), editor.clone()), &WorkflowConfig::default());

        let events: Vec<_> = run.start("draft a launch blurb").unwrap().try_collect().await.unwrap();

        let reqs = requests(&events);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].payload.draft_text, "D1");
        assert!(outputs(&events).is_empty());
        assert_eq!(run.status(), RunStatus::AwaitingInput);
        assert_eq!(run.open_requests().len(), 1);
        assert_eq!(writer.call_count(), 1);
        assert_eq!(editor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_approval_completes_with_final_output() {
        let writer = Arc::new(MockAgent::with_replies("writer", ["D1"]));
        let editor = Arc::new(MockAgent::with_replies("editor", ["E1"]));
        let mut run = WorkflowRun::new(review_graph(writer, editor.clone()), &WorkflowConfig::default());

        let events: Vec<_> = run.start("draft").unwrap().try_collect().await.unwrap();
        let request_id = requests(&events)[0].request_id.clone();

        let answers = HashMap::from([(request_id, "approve".to_string())]);
        let events: Vec<_> = run.resume(answers).unwrap().try_collect().await.unwrap();

        let out = outputs(&events);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "E1");
        assert_eq!(out[0].producer_id, "editor");
        assert!(events.last().is_some_and(|e| e.is_output()));
        assert_eq!(run.status(), RunStatus::Completed);

        let seen = editor.calls();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains(&ChatMessage::assistant("D1")));
    }

    #[tokio::test]
    async fn test_start_and_resume_state_checks() {
        let writer = Arc::new(MockAgent::with_replies("writer", ["D1"]));
        let editor = Arc::new(MockAgent::new("editor"));
        let mut run = WorkflowRun::new(review_graph(writer, editor), &WorkflowConfig::default());

        assert!(matches!(
            run.resume(HashMap::new()),
            Err(GateflowError::InvalidState(_))
        ));

        let _: Vec<_> = run.start("draft").unwrap().try_collect().await.unwrap();
        assert!(matches!(run.start("again"), Err(GateflowError::InvalidState(_))));

        let bogus = HashMap::from([("nope".to_string(), "approve".to_string())]);
        assert!(matches!(
            run.resume(bogus),
            Err(GateflowError::UnknownRequest(id)) if id == "nope"
        ));
        assert_eq!(run.status(), RunStatus::AwaitingInput);
    }

    #[tokio::test]
    async fn test_unanswered_request_stays_open() {
        let writer = Arc::new(MockAgent::with_replies("writer", ["D1"]));
        let editor = Arc::new(MockAgent::new("editor"));
        let mut run = WorkflowRun::new(review_graph(writer, editor), &WorkflowConfig::default());

        let _: Vec<_> = run.start("draft").unwrap().try_collect().await.unwrap();
        let events: Vec<_> = run
            .resume(HashMap::new())
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(run.status(), RunStatus::AwaitingInput);
        assert_eq!(run.open_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_abort_discards_state() {
        let writer = Arc::new(MockAgent::with_replies("writer", ["D1"]));
        let editor = Arc::new(MockAgent::new("editor"));
        let mut run = WorkflowRun::new(review_graph(writer, editor.clone()), &WorkflowConfig::default());

        let _: Vec<_> = run.start("draft").unwrap().try_collect().await.unwrap();
        run.abort();

        assert_eq!(run.status(), RunStatus::Aborted);
        assert!(run.open_requests().is_empty());
        assert!(matches!(
            run.resume(HashMap::new()),
            Err(GateflowError::InvalidState(_))
        ));
        assert_eq!(editor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_agent_failure_fails_run_without_output() {
        let graph = Arc::new(
            WorkflowBuilder::new()
                .add_agent("writer", Arc::new(FailingAgent::new("writer", "model unavailable")))
                .add_output_agent("editor", Arc::new(MockAgent::new("editor")))
                .add_edge("writer", "editor")
                .set_start("writer")
                .build()
                .unwrap(),
        );
        let mut run = WorkflowRun::new(graph, &WorkflowConfig::default());

        let results: Vec<Result<WorkflowEvent>> = run.start("go").unwrap().collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            Err(GateflowError::AgentFailed { node, message }) if node == "writer" && message.contains("model unavailable")
        ));
        assert_eq!(run.status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_idle_run_without_output_fails() {
        let graph = Arc::new(
            WorkflowBuilder::new()
                .add_agent("a", Arc::new(MockAgent::new("a")))
                .add_agent("b", Arc::new(MockAgent::new("b")))
                .add_conditional_edge("a", "b", |_| false)
                .set_start("a")
                .build()
                .unwrap(),
        );
        let mut run = WorkflowRun::new(graph, &WorkflowConfig::default());

        let results: Vec<Result<WorkflowEvent>> = run.start("go").unwrap().collect().await;
        assert!(matches!(results.last(), Some(Err(GateflowError::NoOutput))));
        assert_eq!(run.status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_superstep_limit() {
        let graph = Arc::new(
            WorkflowBuilder::new()
                .add_agent("ping", Arc::new(MockAgent::new("ping")))
                .add_agent("pong", Arc::new(MockAgent::new("pong")))
                .add_edge("ping", "pong")
                .add_edge("pong", "ping")
                .set_start("ping")
                .build()
                .unwrap(),
        );
        let config = WorkflowConfig {
            max_supersteps: 5,
            ..WorkflowConfig::default()
        };
        let mut run = WorkflowRun::new(graph, &config);

        let results: Vec<Result<WorkflowEvent>> = run.start("go").unwrap().collect().await;
        assert!(matches!(
            results.last(),
            Some(Err(GateflowError::MaxSuperstepsExceeded(5)))
        ));
        assert_eq!(run.supersteps(), 6);
    }

    #[tokio::test]
    async fn test_updates_grouped_per_producer() {
        let left = Arc::new(MockAgent::with_replies("left", ["one two three"]).streaming());
        let right = Arc::new(MockAgent::with_replies("right", ["alpha beta"]).streaming());
        let graph = Arc::new(
            WorkflowBuilder::new()
                .add_agent("fan", Arc::new(MockAgent::new("fan")))
                .add_agent("left", left)
                .add_agent("right", right)
                .add_output_agent("sink", Arc::new(MockAgent::with_replies("sink", ["done", "done"])))
                .add_edge("fan", "left")
                .add_edge("fan", "right")
                .add_edge("left", "sink")
                .add_edge("right", "sink")
                .set_start("fan")
                .build()
                .unwrap(),
        );
        let mut run = WorkflowRun::new(graph, &WorkflowConfig::default());

        let events: Vec<_> = run.start("go").unwrap().try_collect().await.unwrap();
        let producers: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::AgentUpdate { producer_id, .. } => Some(producer_id.as_str()),
                _ => None,
            })
            .filter(|p| *p == "left" || *p == "right")
            .collect();
        assert_eq!(producers, vec!["left", "left", "left", "right", "right"]);
        assert_eq!(outputs(&events).len(), 1);
        assert_eq!(run.status(), RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_updates_stream_while_agent_runs() {
        let (open, gate) = oneshot::channel();
        let graph = Arc::new(
            WorkflowBuilder::new()
                .add_output_agent("gated", Arc::new(GatedAgent { gate: Mutex::new(Some(gate)) }))
                .set_start("gated")
                .build()
                .unwrap(),
        );
        let mut run = WorkflowRun::new(graph, &WorkflowConfig::default());
        let mut events = run.start("go").unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("update released before the agent finishes");
        assert!(matches!(
            first,
            Some(Ok(WorkflowEvent::AgentUpdate { ref producer_id, ref text }))
                if producer_id == "gated" && text == "first "
        ));

        open.send(()).unwrap();
        let rest: Vec<_> = events.try_collect().await.unwrap();
        assert_eq!(outputs(&rest).len(), 1);
        assert_eq!(outputs(&rest)[0].text, "first last");
        assert_eq!(run.status(), RunStatus::Completed);
    }
}
