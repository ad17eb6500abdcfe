use std::sync::Arc;

use gateflow_core::traits::Agent;

use crate::coordinator::ReviewCoordinator;

/// What a node does when a message is delivered to it.
#[derive(Clone)]
pub enum NodeKind {
    /// An opaque agent, invoked once per delivered message.
    Agent(Arc<dyn Agent>),
    /// The human review gate.
    Coordinator(ReviewCoordinator),
}

/// A node in the workflow graph.
///
/// Nodes are immutable and reusable across runs; per-run state lives in the run.
#[derive(Clone)]
pub struct Node {
    /// Unique identifier for this node.
    pub id: String,
    pub kind: NodeKind,
    /// Also surface this agent's responses as terminal run output.
    pub emit_output: bool,
}

impl Node {
    /// Create an agent node.
    pub fn agent(id: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Agent(agent),
            emit_output: false,
        }
    }

    /// Create a coordinator node.
    pub fn coordinator(id: impl Into<String>, coordinator: ReviewCoordinator) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Coordinator(coordinator),
            emit_output: false,
        }
    }

    /// Mark this node's responses as run output.
    pub fn with_output(mut self) -> Self {
        self.emit_output = true;
        self
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(self.kind, NodeKind::Coordinator(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Agent(_) => "agent",
            NodeKind::Coordinator(_) => "coordinator",
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind_name())
            .field("emit_output", &self.emit_output)
            .finish()
    }
}
