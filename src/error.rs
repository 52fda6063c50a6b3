//! Error types for Docent.

use thiserror::Error;

/// Library-level error type for Docent operations.
#[derive(Error, Debug)]
pub enum DocentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No valid chunks generated")]
    NoValidChunks,

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("History store error: {0}")]
    History(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("{0} timed out after {1}s")]
    Timeout(String, u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl DocentError {
    /// Whether this error is caused by the caller's input rather than by a
    /// failing capability. Input errors surface as 4xx responses.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, DocentError::InvalidInput(_) | DocentError::NoValidChunks)
    }
}

/// Result type alias for Docent operations.
pub type Result<T> = std::result::Result<T, DocentError>;
