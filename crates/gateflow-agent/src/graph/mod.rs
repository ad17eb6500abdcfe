//! Workflow graph: agent and coordinator nodes joined by conditioned edges.
//!
//! A graph is validated once at build time and is immutable afterwards, so
//! one graph can back any number of concurrent runs. Each run is a
//! [`WorkflowRun`] that delivers messages along the graph's edges in
//! supersteps and suspends when a coordinator asks for human input.

pub mod edge;
pub mod executor;
pub mod node;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use gateflow_core::error::{GateflowError, Result};
use gateflow_core::traits::Agent;
use gateflow_core::types::AgentResponse;

use crate::coordinator::ReviewCoordinator;

pub use edge::{Edge, RoutePredicate};
pub use executor::{RunStatus, WorkflowRun};
pub use node::{Node, NodeKind};

/// A validated, immutable workflow graph.
#[derive(Debug)]
pub struct WorkflowGraph {
    nodes: HashMap<String, Node>,
    /// Node ids in declaration order.
    order: Vec<String>,
    edges: Vec<Edge>,
    start: String,
}

impl WorkflowGraph {
    /// Validate and build a graph.
    ///
    /// Fails with `GateflowError::Config` on a duplicate node id, an unknown
    /// start node, an edge touching an undeclared node, a node unreachable from
    /// the start, or a coordinator whose drafter or final node is not wired.
    pub fn build(nodes: Vec<Node>, edges: Vec<Edge>, start: impl Into<String>) -> Result<Self> {
        let start = start.into();
        let mut map = HashMap::new();
        let mut order = Vec::with_capacity(nodes.len());
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(GateflowError::Config(format!("duplicate node id '{}'", node.id)));
            }
            order.push(node.id.clone());
            map.insert(node.id.clone(), node);
        }

        match map.get(&start) {
            None => {
                return Err(GateflowError::Config(format!(
                    "start node '{}' is not declared",
                    start
                )))
            }
            Some(node) if node.is_coordinator() => {
                return Err(GateflowError::Config(format!(
                    "start node '{}' must be an agent",
                    start
                )))
            }
            Some(_) => {}
        }

        for edge in &edges {
            for end in [&edge.from, &edge.to] {
                if !map.contains_key(end) {
                    return Err(GateflowError::Config(format!(
                        "edge {} -> {} references undeclared node '{}'",
                        edge.from, edge.to, end
                    )));
                }
            }
        }

        let graph = Self {
            nodes: map,
            order,
            edges,
            start,
        };
        graph.check_coordinators()?;
        graph.check_reachable()?;
        Ok(graph)
    }

    fn check_coordinators(&self) -> Result<()> {
        for id in &self.order {
            let NodeKind::Coordinator(coordinator) = &self.nodes[id].kind else {
                continue;
            };
            for (role, target) in [
                ("drafter", coordinator.drafter_id()),
                ("final", coordinator.final_id()),
            ] {
                match self.nodes.get(target) {
                    None => {
                        return Err(GateflowError::Config(format!(
                            "coordinator '{}' names undeclared {} node '{}'",
                            id, role, target
                        )))
                    }
                    Some(node) if node.is_coordinator() => {
                        return Err(GateflowError::Config(format!(
                            "coordinator '{}' {} node '{}' must be an agent",
                            id, role, target
                        )))
                    }
                    Some(_) => {}
                }
                if !self.has_edge(id, target) {
                    return Err(GateflowError::Config(format!(
                        "coordinator '{}' has no edge to its {} node '{}'",
                        id, role, target
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_reachable(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([self.start.as_str()]);
        seen.insert(self.start.as_str());
        while let Some(id) = queue.pop_front() {
            for edge in self.edges.iter().filter(|e| e.from == id) {
                if seen.insert(edge.to.as_str()) {
                    queue.push_back(edge.to.as_str());
                }
            }
        }
        match self.order.iter().find(|id| !seen.contains(id.as_str())) {
            Some(id) => Err(GateflowError::Config(format!(
                "node '{}' is unreachable from start node '{}'",
                id, self.start
            ))),
            None => Ok(()),
        }
    }

    /// Targets of every outgoing edge of `from` whose condition holds, in declaration order.
    ///
    /// An empty result means the response is dropped.
    pub fn route(&self, from: &str, response: &AgentResponse) -> Vec<String> {
        let targets: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.from == from && e.matches(response))
            .map(|e| e.to.clone())
            .collect();
        debug!(from, targets = ?targets, "Routed response");
        targets
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn start(&self) -> &str {
        &self.start
    }
}

/// Fluent construction of a [`WorkflowGraph`].
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    start: Option<String>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_agent(self, id: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.add_node(Node::agent(id, agent))
    }

    /// Add an agent whose responses are also surfaced as run output.
    pub fn add_output_agent(self, id: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.add_node(Node::agent(id, agent).with_output())
    }

    pub fn add_coordinator(self, id: impl Into<String>, coordinator: ReviewCoordinator) -> Self {
        self.add_node(Node::coordinator(id, coordinator))
    }

    pub fn set_start(mut self, id: impl Into<String>) -> Self {
        self.start = Some(id.into());
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::always(from, to));
        self
    }

    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&AgentResponse) -> bool + Send + Sync + 'static,
    {
        self.edges.push(Edge::when(from, to, predicate));
        self
    }

    pub fn build(self) -> Result<WorkflowGraph> {
        let start = self
            .start
            .ok_or_else(|| GateflowError::Config("no start node set".to_string()))?;
        WorkflowGraph::build(self.nodes, self.edges, start)
    }
}
