//! Wire types for the upstream chat-completion API.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Role};

/// Role of a message sent upstream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionRole {
    /// The mode's system prompt.
    System,
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
}

impl From<Role> for CompletionRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => CompletionRole::User,
            Role::Assistant => CompletionRole::Assistant,
        }
    }
}

/// A message in an upstream completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Role of the message.
    pub role: CompletionRole,
    /// Text content.
    pub content: String,
}

impl CompletionMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: CompletionRole::System,
            content: content.into(),
        }
    }
}

impl From<ChatMessage> for CompletionMessage {
    fn from(message: ChatMessage) -> Self {
        Self {
            role: message.role.into(),
            content: message.content,
        }
    }
}

/// Parameters for a streaming chat completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionCreateParams {
    /// Upstream model identifier.
    pub model: String,
    /// System prompt followed by the conversation.
    pub messages: Vec<CompletionMessage>,
    /// Always true for relay requests.
    pub stream: bool,
    /// Cap on generated tokens.
    pub max_completion_tokens: u32,
}

impl ChatCompletionCreateParams {
    /// Create streaming parameters.
    pub fn new(
        model: impl Into<String>,
        messages: Vec<CompletionMessage>,
        max_completion_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            max_completion_tokens,
        }
    }
}

/// The incremental part of a streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Role, present on the first chunk only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One choice of a streamed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    #[serde(default)]
    pub index: u32,
    /// Incremental content.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Set on the final chunk of the choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A chunk of a streamed chat completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Completion identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Streamed choices; the relay only reads the first.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// A chunk carrying a single text delta.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: None,
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some(content.into()),
                },
                finish_reason: None,
            }],
        }
    }

    /// The text delta of the first choice, if it is non-empty.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()?
            .delta
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
    }
}

/// Error object returned by the upstream, either as a response body or
/// inside the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamErrorDetail {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error type.
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Offending parameter.
    #[serde(default)]
    pub param: Option<String>,
}

/// Envelope around [`UpstreamErrorDetail`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamErrorBody {
    /// The error.
    pub error: UpstreamErrorDetail,
}
