use std::sync::Arc;

use gateflow_core::types::AgentResponse;

/// Predicate deciding whether a response travels along an edge.
pub type RoutePredicate = Arc<dyn Fn(&AgentResponse) -> bool + Send + Sync>;

/// An edge connecting two nodes in the workflow graph.
#[derive(Clone)]
pub struct Edge {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Condition that must hold to traverse this edge. `None` always matches.
    pub condition: Option<RoutePredicate>,
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    /// Create an edge that fires only when `predicate` holds.
    pub fn when<F>(from: impl Into<String>, to: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&AgentResponse) -> bool + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(predicate)),
        }
    }

    /// Whether `response` may traverse this edge.
    pub fn matches(&self, response: &AgentResponse) -> bool {
        match &self.condition {
            None => true,
            Some(predicate) => predicate(response),
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_builders() {
        let e = Edge::always("a", "b");
        assert_eq!(e.from, "a");
        assert_eq!(e.to, "b");
        assert!(e.condition.is_none());

        let e = Edge::when("a", "c", |r| r.text.contains("ok"));
        assert!(e.condition.is_some());
    }

    #[test]
    fn test_unconditional_edge_always_matches() {
        let e = Edge::always("a", "b");
        assert!(e.matches(&AgentResponse::new("a", "")));
    }

    #[test]
    fn test_conditional_edge() {
        let e = Edge::when("a", "b", |r| r.text.contains("ok"));
        assert!(e.matches(&AgentResponse::new("a", "all ok")));
        assert!(!e.matches(&AgentResponse::new("a", "failed")));
    }

    #[test]
    fn test_debug_hides_predicate() {
        let e = Edge::when("a", "b", |_| true);
        let dbg = format!("{:?}", e);
        assert!(dbg.contains("conditional: true"));
    }
}
