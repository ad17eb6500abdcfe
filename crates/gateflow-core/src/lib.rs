pub mod config;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{GateflowError, Result};
pub use event::{DraftFeedbackRequest, PendingRequest, WorkflowEvent};
pub use types::*;
