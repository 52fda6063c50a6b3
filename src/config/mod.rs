//! Configuration module for Docent.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{LanguagePrompts, Prompts, RagPrompts, RewritePrompts, DEFAULT_SYSTEM_PROMPT};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, HistorySettings, LanguageSettings,
    ModelSettings, OpenAISettings, PromptSettings, RetrievalSettings, RewriteSettings,
    ServerSettings, Settings, StoreSettings,
};
