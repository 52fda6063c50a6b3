//! Assembly of the final answer-generation message list.

use crate::config::RagPrompts;
use crate::history::Message;
use crate::llm::ChatMessage;

/// Builds `[system, ...history, user]` message lists for answer generation.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    prompts: RagPrompts,
}

impl PromptAssembler {
    pub fn new(prompts: RagPrompts) -> Self {
        Self { prompts }
    }

    /// Compose the messages for one answer.
    ///
    /// Retrieved context is appended to the system instruction after the
    /// configured separator. History is replayed in order, untruncated.
    pub fn build(
        &self,
        system_prompt: &str,
        context: &[String],
        history: &[Message],
        question: &str,
    ) -> Vec<ChatMessage> {
        let mut system = system_prompt.to_string();
        if !context.is_empty() {
            system.push_str(&self.prompts.context_separator);
            system.push_str(&context.join(&self.prompts.chunk_joiner));
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::System(system));
        messages.extend(
            history
                .iter()
                .map(|m| ChatMessage::from_role(m.role, m.content.clone())),
        );
        messages.push(ChatMessage::User(question.to_string()));
        messages
    }
}
