//! Follow-up question rewriting.
//!
//! Short follow-ups like "and for adults?" retrieve poorly on their own.
//! When there is enough conversation behind them they are rewritten into
//! standalone queries before embedding. Rewriting is strictly optional:
//! every failure yields the question unchanged.

use crate::capability::{bounded, DEFAULT_CALL_TIMEOUT};
use crate::config::{Prompts, RewriteSettings};
use crate::history::Message;
use crate::llm::{ChatMessage, ChatModel, CompletionOptions};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Rewrites context-dependent questions into standalone queries.
pub struct QueryRewriter {
    model: Arc<dyn ChatModel>,
    settings: RewriteSettings,
    prompts: Prompts,
    timeout: Duration,
}

impl QueryRewriter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            settings: RewriteSettings::default(),
            prompts: Prompts::default(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_settings(mut self, settings: RewriteSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `question` qualifies for rewriting given `history` prior turns.
    pub fn should_rewrite(&self, question: &str, history: &[Message]) -> bool {
        history.len() >= self.settings.min_history_turns
            && question.chars().count() <= self.settings.max_question_chars
    }

    /// Rewrite `question` using the recent `history`, or return it unchanged.
    pub async fn rewrite(&self, question: &str, history: &[Message]) -> String {
        if !self.should_rewrite(question, history) {
            return question.to_string();
        }

        let recent = &history[history.len().saturating_sub(self.settings.recent_turns)..];
        let transcript = recent
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("history".to_string(), transcript);
        vars.insert("question".to_string(), question.to_string());
        let prompt = self.prompts.render_with_custom(&self.prompts.rewrite.user, &vars);

        let options = CompletionOptions {
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens),
        };
        let messages = [ChatMessage::User(prompt)];

        match bounded("query rewrite", self.timeout, self.model.complete(&messages, options)).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                let rewritten = rewritten.trim().to_string();
                debug!("Rewrote {:?} as {:?}", question, rewritten);
                rewritten
            }
            Ok(_) => question.to_string(),
            Err(e) => {
                warn!("Query rewrite failed, using original question: {}", e);
                question.to_string()
            }
        }
    }
}
