pub mod providers;
pub mod streaming;

use gateflow_core::config::ModelConfig;
use gateflow_core::traits::LlmClient;

pub use providers::openai::OpenAiClient;
pub use providers::presets::apply_preset_defaults;

/// Create an LLM client for the configured provider.
///
/// Every supported host speaks the OpenAI chat-completions wire format, so the
/// provider only selects endpoint defaults (see [`apply_preset_defaults`]).
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    tracing::debug!(provider = %config.provider, model = %config.model_id, "Creating LLM client");
    Box::new(OpenAiClient::new())
}
