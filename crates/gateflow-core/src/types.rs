use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A chat message. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Ordered message history threaded through a workflow.
pub type Conversation = Vec<ChatMessage>;

/// What an agent hands back when an invocation finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Final response text.
    pub text: String,
    /// Messages produced by this invocation only.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Optional structured payload (e.g. a JSON review verdict).
    #[serde(default)]
    pub structured: Option<serde_json::Value>,
}

impl AgentReply {
    /// A plain assistant reply.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            messages: vec![ChatMessage::assistant(text.clone())],
            text,
            structured: None,
        }
    }

    pub fn with_structured(mut self, value: serde_json::Value) -> Self {
        self.structured = Some(value);
        self
    }
}

/// One item of an agent's output stream.
#[derive(Debug, Clone)]
pub enum AgentDelta {
    /// Partial text, display only.
    Text(String),
    /// The invocation is complete.
    Done(AgentReply),
}

/// A response produced by one agent invocation, tagged with the producing node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Node id of the agent that produced this response.
    pub producer_id: String,
    pub text: String,
    /// The response's own messages.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Input conversation plus the response messages, when the producer supplies it.
    #[serde(default)]
    pub full_conversation: Option<Conversation>,
    #[serde(default)]
    pub structured: Option<serde_json::Value>,
}

impl AgentResponse {
    pub fn new(producer_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            producer_id: producer_id.into(),
            messages: vec![ChatMessage::assistant(text.clone())],
            text,
            full_conversation: None,
            structured: None,
        }
    }

    /// Build the response for `producer_id` from its reply to `input`.
    pub fn from_reply(producer_id: impl Into<String>, input: &[ChatMessage], reply: AgentReply) -> Self {
        let mut messages = reply.messages;
        if messages.is_empty() && !reply.text.is_empty() {
            messages.push(ChatMessage::assistant(reply.text.clone()));
        }
        let mut full = input.to_vec();
        full.extend(messages.iter().cloned());
        Self {
            producer_id: producer_id.into(),
            text: reply.text,
            messages,
            full_conversation: Some(full),
            structured: reply.structured,
        }
    }

    pub fn with_full_conversation(mut self, conversation: Conversation) -> Self {
        self.full_conversation = Some(conversation);
        self
    }

    pub fn with_structured(mut self, value: serde_json::Value) -> Self {
        self.structured = Some(value);
        self
    }

    /// The richest conversation available: the full trace, else the response's own messages.
    pub fn conversation(&self) -> Conversation {
        match &self.full_conversation {
            Some(full) => full.clone(),
            None => self.messages.clone(),
        }
    }
}

/// A message asking an agent node to respond to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub messages: Conversation,
    /// When false the agent does not run.
    pub should_respond: bool,
}

impl AgentRequest {
    pub fn respond(messages: Conversation) -> Self {
        Self {
            messages,
            should_respond: true,
        }
    }
}

/// Output format requested from an LLM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonObject,
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reply_builds_full_trace() {
        let input = vec![ChatMessage::user("write a blurb")];
        let resp = AgentResponse::from_reply("writer", &input, AgentReply::text("Draft one"));

        assert_eq!(resp.producer_id, "writer");
        assert_eq!(resp.text, "Draft one");
        assert_eq!(resp.messages, vec![ChatMessage::assistant("Draft one")]);
        assert_eq!(
            resp.full_conversation,
            Some(vec![
                ChatMessage::user("write a blurb"),
                ChatMessage::assistant("Draft one"),
            ])
        );
    }

    #[test]
    fn test_from_reply_without_messages_synthesizes_assistant_turn() {
        let reply = AgentReply {
            text: "bare".into(),
            messages: vec![],
            structured: None,
        };
        let resp = AgentResponse::from_reply("a", &[], reply);
        assert_eq!(resp.messages, vec![ChatMessage::assistant("bare")]);
    }

    #[test]
    fn test_conversation_falls_back_to_messages() {
        let resp = AgentResponse::new("writer", "hello");
        assert_eq!(resp.conversation(), vec![ChatMessage::assistant("hello")]);

        let resp = resp.with_full_conversation(vec![ChatMessage::user("q"), ChatMessage::assistant("hello")]);
        assert_eq!(resp.conversation().len(), 2);
    }

    #[test]
    fn test_role_serialization() {
        let msg = ChatMessage::system("be terse");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"system","text":"be terse"}"#);
    }
}
