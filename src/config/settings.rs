//! Configuration settings for Docent.

use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub openai: OpenAISettings,
    pub models: ModelSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub rewrite: RewriteSettings,
    pub language: LanguageSettings,
    pub history: HistorySettings,
    pub store: StoreSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.docent".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory served as static files at `/` (chat widget, upload page).
    pub static_dir: Option<String>,
    /// Maximum accepted request body size.
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// OpenAI connection settings. The API key comes from `OPENAI_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// Alternative API base URL (OpenAI-compatible servers).
    pub api_base: Option<String>,
    /// HTTP client timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            api_base: None,
            timeout_secs: 120,
        }
    }
}

/// Model selection for generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model that writes the final answer.
    pub answer_model: String,
    /// Cheaper model for language detection, translation and query rewriting.
    pub utility_model: String,
    /// Upper bound for any single external call, in seconds.
    pub capability_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            answer_model: "gpt-4o".to_string(),
            utility_model: "gpt-3.5-turbo".to_string(),
            capability_timeout_secs: 60,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. Must stay fixed for the lifetime of a store.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Document chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
    /// Embedding requests in flight at once during ingestion.
    pub max_concurrent_embeddings: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            max_concurrent_embeddings: 4,
        }
    }
}

/// Vector retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Minimum cosine similarity for a chunk to qualify.
    pub match_threshold: f32,
    /// Maximum number of matches requested from the store.
    pub match_count: usize,
    /// Matches actually placed in the prompt.
    pub max_context_chunks: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.60,
            match_count: 10,
            max_context_chunks: 5,
        }
    }
}

/// Follow-up question rewriting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteSettings {
    /// Fewer prior turns than this and the question is used as-is.
    pub min_history_turns: usize,
    /// Questions longer than this (in characters) are used as-is.
    pub max_question_chars: usize,
    /// Number of recent turns shown to the rewriter.
    pub recent_turns: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            min_history_turns: 2,
            max_question_chars: 50,
            recent_turns: 6,
            temperature: 0.1,
            max_tokens: 150,
        }
    }
}

/// Language handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageSettings {
    /// Language retrieval and generation prompts are composed in.
    pub working_language: Language,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            working_language: Language::English,
        }
    }
}

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Most recent turns replayed into prompts.
    pub max_prompt_turns: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { max_prompt_turns: 20 }
    }
}

/// Storage settings for chunks and chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database holding chunks and history.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.docent/docent.db".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Plain-text system prompt, re-read on every chat request.
    pub system_prompt_path: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject combinations the pipelines cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.chunking.chunk_size == 0 || self.chunking.overlap >= self.chunking.chunk_size {
            return Err(crate::error::DocentError::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.match_threshold) {
            return Err(crate::error::DocentError::Config(format!(
                "retrieval.match_threshold must be within [-1, 1], got {}",
                self.retrieval.match_threshold
            )));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DocentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docent")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }

    /// Get the expanded static file directory, if one is configured.
    pub fn static_dir(&self) -> Option<PathBuf> {
        self.server.static_dir.as_deref().map(Self::expand_path)
    }

    /// Per-call timeout for external capabilities.
    pub fn capability_timeout(&self) -> Duration {
        Duration::from_secs(self.models.capability_timeout_secs)
    }
}
