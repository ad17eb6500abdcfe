use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateflowError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    // Agent errors
    #[error("Agent failed: {node}: {message}")]
    AgentFailed { node: String, message: String },

    // Routing errors. Recovered locally by the quality gate, never surfaced from a run.
    #[error("Predicate evaluation failed: {0}")]
    PredicateEvaluation(String),

    // Run lifecycle errors
    #[error("Run aborted by caller")]
    Aborted,

    #[error("No pending request with id: {0}")]
    UnknownRequest(String),

    #[error("Invalid run state: {0}")]
    InvalidState(String),

    #[error("Run exceeded max supersteps ({0})")]
    MaxSuperstepsExceeded(usize),

    #[error("Run became idle without producing an output")]
    NoOutput,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GateflowError {
    /// Wrap an opaque collaborator failure as a failed agent invocation.
    pub fn agent(node: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::AgentFailed {
            node: node.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GateflowError>;
