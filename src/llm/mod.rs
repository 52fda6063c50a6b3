//! Text generation capability.
//!
//! Detection, translation, rewriting and answering all go through the
//! [`ChatModel`] trait, so tests can substitute scripted models.

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use crate::history::Role;
use async_trait::async_trait;

/// A role-tagged message sent to a chat model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant(String),
}

impl ChatMessage {
    /// Message for a persisted conversation turn.
    pub fn from_role(role: Role, content: impl Into<String>) -> Self {
        match role {
            Role::User => ChatMessage::User(content.into()),
            Role::Assistant => ChatMessage::Assistant(content.into()),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ChatMessage::System(c) | ChatMessage::User(c) | ChatMessage::Assistant(c) => c,
        }
    }

    pub fn role_name(&self) -> &'static str {
        match self {
            ChatMessage::System(_) => "system",
            ChatMessage::User(_) => "user",
            ChatMessage::Assistant(_) => "assistant",
        }
    }
}

/// Sampling options for a single completion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Deterministic-leaning settings for classification and translation.
    pub fn deterministic() -> Self {
        Self {
            temperature: Some(0.0),
            max_tokens: None,
        }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation and return the generated text.
    async fn complete(&self, messages: &[ChatMessage], options: CompletionOptions) -> Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}
