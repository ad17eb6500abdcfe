pub mod chat_agent;
pub mod coordinator;
pub mod driver;
pub mod graph;
pub mod quality;
pub mod workflows;

pub use chat_agent::ChatAgent;
pub use coordinator::{CoordinatorAction, CoordinatorPhase, CoordinatorState, ReviewCoordinator};
pub use driver::{RunSummary, WorkflowDriver};
pub use graph::{Edge, Node, NodeKind, RunStatus, WorkflowBuilder, WorkflowGraph, WorkflowRun};
pub use quality::{QualityGate, ReviewResult};
