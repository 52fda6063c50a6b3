//! Context retrieval for answer generation.

use crate::config::RetrievalSettings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{ChunkMatch, VectorStore};
use std::sync::Arc;
use tracing::debug;

/// Embeds a query and fetches the most similar stored chunks.
pub struct ContextBuilder {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    settings: RetrievalSettings,
}

impl ContextBuilder {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            settings: RetrievalSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RetrievalSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Embed the query. Kept separate so the caller can bound it on its own.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder.embed(query).await
    }

    /// Matches above the threshold, best first, trimmed to the context budget.
    pub async fn retrieve(&self, query_vector: &[f32]) -> Result<Vec<ChunkMatch>> {
        let mut matches = self
            .vector_store
            .query(
                query_vector,
                self.settings.match_threshold,
                self.settings.match_count,
            )
            .await?;
        matches.truncate(self.settings.max_context_chunks);

        for m in &matches {
            debug!("Context from {} (similarity {:.3})", m.source, m.similarity);
        }
        Ok(matches)
    }
}

/// Chunk texts in the order they go into the prompt.
pub fn context_texts(matches: &[ChunkMatch]) -> Vec<String> {
    matches.iter().map(|m| m.content.clone()).collect()
}
