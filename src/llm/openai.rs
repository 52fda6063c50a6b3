//! OpenAI chat completions implementation.

use super::{ChatMessage, ChatModel, CompletionOptions};
use crate::error::{DocentError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI-based chat model.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIChatModel {
    /// Create a chat model bound to `model`, sharing an existing client.
    pub fn new(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let built: ChatCompletionRequestMessage = match message {
            ChatMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| DocentError::Generation(e.to_string()))?
                .into(),
            ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| DocentError::Generation(e.to_string()))?
                .into(),
            ChatMessage::Assistant(content) => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| DocentError::Generation(e.to_string()))?
                .into(),
        };
        Ok(built)
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, messages), fields(model = %self.model, count = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage], options: CompletionOptions) -> Result<String> {
        let request_messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(request_messages);
        if let Some(temperature) = options.temperature {
            args.temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        let request = args
            .build()
            .map_err(|e| DocentError::Generation(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            DocentError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DocentError::Generation("Empty response from LLM".to_string()))?;

        debug!("Generated {} characters", content.len());
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
