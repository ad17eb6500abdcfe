use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GateflowError, Result};

/// Top-level gateflow configuration.
///
/// Built once at process start and passed by reference to agents and the
/// execution driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub quality: QualityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Full chat-completions endpoint. Falls back to the provider preset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_provider() -> String { "github".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Execution limits and display options for workflow runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Hard cap on supersteps per run, across all pause/resume cycles.
    #[serde(default = "default_max_supersteps")]
    pub max_supersteps: usize,
    /// Print streaming agent updates in the CLI.
    #[serde(default)]
    pub show_updates: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_supersteps: default_max_supersteps(),
            show_updates: false,
        }
    }
}

fn default_max_supersteps() -> usize { 64 }

/// Texts and keywords used by the human review gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Answer that approves the draft as-is (compared trimmed, case-insensitive).
    #[serde(default = "default_approval_keyword")]
    pub approval_keyword: String,
    /// CLI answer that abandons the run.
    #[serde(default = "default_abandon_keyword")]
    pub abandon_keyword: String,
    /// Substituted for an empty draft.
    #[serde(default = "default_draft_placeholder")]
    pub draft_placeholder: String,
    #[serde(default = "default_reviewer_prompt")]
    pub reviewer_prompt: String,
    /// Appended to the conversation when the draft is approved.
    #[serde(default = "default_approved_message")]
    pub approved_message: String,
    /// Revision instruction; `{guidance}` is replaced by the reviewer's note.
    #[serde(default = "default_revision_template")]
    pub revision_template: String,
    /// Used in place of a blank reviewer note.
    #[serde(default = "default_no_guidance_text")]
    pub no_guidance_text: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            approval_keyword: default_approval_keyword(),
            abandon_keyword: default_abandon_keyword(),
            draft_placeholder: default_draft_placeholder(),
            reviewer_prompt: default_reviewer_prompt(),
            approved_message: default_approved_message(),
            revision_template: default_revision_template(),
            no_guidance_text: default_no_guidance_text(),
        }
    }
}

impl ReviewConfig {
    /// True if `answer` is the approval keyword.
    pub fn is_approval(&self, answer: &str) -> bool {
        answer.trim().to_lowercase() == self.approval_keyword.trim().to_lowercase()
    }

    /// True if `answer` is the abandon keyword.
    pub fn is_abandon(&self, answer: &str) -> bool {
        answer.trim().to_lowercase() == self.abandon_keyword.trim().to_lowercase()
    }

    /// Render the revision instruction for a reviewer note.
    pub fn revision_instruction(&self, guidance: &str) -> String {
        let guidance = guidance.trim();
        let guidance = if guidance.is_empty() {
            self.no_guidance_text.as_str()
        } else {
            guidance
        };
        self.revision_template.replace("{guidance}", guidance)
    }
}

fn default_approval_keyword() -> String { "approve".to_string() }
fn default_abandon_keyword() -> String { "quit".to_string() }
fn default_draft_placeholder() -> String { "No draft was produced.".to_string() }
fn default_reviewer_prompt() -> String {
    "Review the writer's draft and share a short directional note \
     (tone tweaks, must-have details, target audience, etc.). \
     Keep the note under 30 words."
        .to_string()
}
fn default_approved_message() -> String { "The draft is approved as-is.".to_string() }
fn default_revision_template() -> String {
    "A human reviewer shared the following guidance:\n{guidance}\n\n\
     Rewrite the draft from the previous assistant message into a polished final version. \
     Keep the response under 120 words and reflect any requested tone adjustments."
        .to_string()
}
fn default_no_guidance_text() -> String { "No specific guidance provided.".to_string() }

/// Content-quality gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Review scores at or above this value are approved.
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: i64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            approval_threshold: default_approval_threshold(),
        }
    }
}

fn default_approval_threshold() -> i64 { 80 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| GateflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| GateflowError::Config(e.to_string()))
    }

    /// Build a config from process environment variables (see [`ModelConfig::from_env_with`]).
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            model: ModelConfig::from_env_with(lookup)?,
            workflow: WorkflowConfig::default(),
            review: ReviewConfig::default(),
            quality: QualityConfig::default(),
        })
    }

    /// Copy of this config safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.model.api_key.is_some() {
            config.model.api_key = Some("***".to_string());
        }
        config
    }
}

impl ModelConfig {
    /// Select a model host from `API_HOST`.
    ///
    /// - `github` (default): `GITHUB_TOKEN`, optional `GITHUB_MODEL`
    /// - `azure`: `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_CHAT_DEPLOYMENT`
    /// - `ollama`: optional `OLLAMA_ENDPOINT`, `OLLAMA_MODEL`
    /// - anything else: `OPENAI_API_KEY`, optional `OPENAI_MODEL`
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key).ok_or_else(|| GateflowError::Config(format!("{} is not set", key)))
        };
        let host = lookup("API_HOST").unwrap_or_else(|| "github".to_string());

        let (provider, model_id, api_key, base_url) = match host.as_str() {
            "azure" => {
                let endpoint = require("AZURE_OPENAI_ENDPOINT")?;
                (
                    "azure".to_string(),
                    require("AZURE_OPENAI_CHAT_DEPLOYMENT")?,
                    Some(require("AZURE_OPENAI_API_KEY")?),
                    Some(format!(
                        "{}/openai/v1/chat/completions",
                        endpoint.trim_end_matches('/')
                    )),
                )
            }
            "github" => (
                "github".to_string(),
                lookup("GITHUB_MODEL").unwrap_or_else(|| "openai/gpt-4o".to_string()),
                Some(require("GITHUB_TOKEN")?),
                None,
            ),
            "ollama" => {
                let endpoint = lookup("OLLAMA_ENDPOINT")
                    .unwrap_or_else(|| "http://localhost:11434/v1".to_string());
                (
                    "ollama".to_string(),
                    lookup("OLLAMA_MODEL").unwrap_or_else(|| "llama3.1:latest".to_string()),
                    None,
                    Some(format!("{}/chat/completions", endpoint.trim_end_matches('/'))),
                )
            }
            _ => (
                "openai".to_string(),
                lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
                Some(require("OPENAI_API_KEY")?),
                None,
            ),
        };

        Ok(Self {
            provider,
            model_id,
            api_key,
            base_url,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            extra_headers: HashMap::new(),
        })
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
