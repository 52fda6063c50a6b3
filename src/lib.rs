//! Docent - retrieval-augmented chat over your own documents
//!
//! Uploaded text is chunked, embedded and stored. Chat questions are
//! answered from the most similar chunks, in the language they were asked
//! in, with each session's history replayed into the prompt.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `chunking` - Boundary-aware text chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Chunk storage and similarity search
//! - `history` - Per-session conversation turns
//! - `llm` - Chat completion backends
//! - `language` - Language detection and translation
//! - `rewrite` - Follow-up question rewriting
//! - `rag` - Context retrieval and the answer pipeline
//! - `ingest` - Document ingestion pipeline
//! - `server` - HTTP endpoints
//!
//! # Example
//!
//! ```rust,no_run
//! use docent::config::Settings;
//! use docent::rag::ChatRequest;
//! use docent::server::AppState;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let state = AppState::from_settings(&settings)?;
//!
//!     state.ingest.ingest("faq.txt", "Autism is a developmental condition.").await?;
//!     let reply = state.chat.answer(ChatRequest::new("What is autism?")).await?;
//!     println!("{} (session {})", reply.answer, reply.session_id);
//!
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod history;
pub mod ingest;
pub mod language;
pub mod llm;
pub mod markup;
pub mod openai;
pub mod prompt;
pub mod rag;
pub mod rewrite;
pub mod server;
pub mod session;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{DocentError, Result};
