//! Scripted capabilities for unit tests.

use crate::embedding::Embedder;
use crate::error::{DocentError, Result};
use crate::llm::{ChatMessage, ChatModel, CompletionOptions};
use async_trait::async_trait;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;

/// Chat model answering through a closure and recording every call.
pub struct ScriptedChatModel {
    responder: Responder,
    calls: Mutex<Vec<(Vec<ChatMessage>, CompletionOptions)>>,
}

impl ScriptedChatModel {
    pub fn new(responder: impl Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fail.
    pub fn failing() -> Self {
        Self::new(|_| Err(DocentError::Generation("model unavailable".into())))
    }

    pub fn calls(&self) -> Vec<(Vec<ChatMessage>, CompletionOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, messages: &[ChatMessage], options: CompletionOptions) -> Result<String> {
        self.calls.lock().unwrap().push((messages.to_vec(), options));
        (self.responder)(messages)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// The system instruction of a call, or "" when there is none.
pub fn system_of(messages: &[ChatMessage]) -> &str {
    match messages.first() {
        Some(ChatMessage::System(content)) => content,
        _ => "",
    }
}

/// The last user message of a call.
pub fn last_user(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find_map(|m| match m {
            ChatMessage::User(content) => Some(content.as_str()),
            _ => None,
        })
        .unwrap_or("")
}

/// Bag-of-keywords embedder: dimension `i` is 1.0 when keyword `i` occurs.
///
/// Texts containing `FAIL` fail to embed.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());
        if text.contains("FAIL") {
            return Err(DocentError::Embedding("embedding service rejected text".into()));
        }
        let lower = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|k| if lower.contains(k.as_str()) { 1.0 } else { 0.0 })
            .collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.keywords.len()
    }
}
