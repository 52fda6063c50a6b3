//! Document ingestion: chunk, embed, store.
//!
//! Partial success is acceptable. Chunks that fail to embed, or come back
//! with the wrong dimensionality, are skipped and the rest are stored.

use crate::capability::{bounded, DEFAULT_CALL_TIMEOUT};
use crate::chunking::TextChunker;
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{DocentError, Result};
use crate::vector_store::{StoredChunk, VectorStore};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Turns uploaded text into stored, embedded chunks.
pub struct IngestionPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    max_concurrent: usize,
    timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            chunker: TextChunker::default(),
            embedder,
            vector_store,
            max_concurrent: 4,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        Ok(Self {
            chunker: TextChunker::from_settings(&settings.chunking)?,
            embedder,
            vector_store,
            max_concurrent: settings.chunking.max_concurrent_embeddings.max(1),
            timeout: settings.capability_timeout(),
        })
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Chunk, embed and store `raw_text` under `source`. Returns the stored count.
    #[instrument(skip(self, raw_text), fields(source = %source, bytes = raw_text.len()))]
    pub async fn ingest(&self, source: &str, raw_text: &str) -> Result<usize> {
        if source.trim().is_empty() || raw_text.trim().is_empty() {
            return Err(DocentError::InvalidInput(
                "File name and content are required.".into(),
            ));
        }

        let chunks = self.chunker.chunk(raw_text)?;
        let chunk_count = chunks.len();
        let dimensions = self.embedder.dimensions();

        let mut embedded: Vec<(usize, String, Vec<f32>)> = Vec::with_capacity(chunk_count);

        let mut stream = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, text)| async move {
                let result = bounded("chunk embedding", self.timeout, self.embedder.embed(&text)).await;
                (idx, text, result)
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((idx, text, result)) = stream.next().await {
            match result {
                Ok(vector) if vector.len() == dimensions => embedded.push((idx, text, vector)),
                Ok(vector) => warn!(
                    "Skipping chunk {}: embedding has {} dimensions, expected {}",
                    idx,
                    vector.len(),
                    dimensions
                ),
                Err(e) => warn!("Skipping chunk {}: {}", idx, e),
            }
        }

        if embedded.is_empty() {
            return Err(DocentError::NoValidChunks);
        }

        embedded.sort_by_key(|(idx, _, _)| *idx);

        let ingested_at = Utc::now();
        let records: Vec<StoredChunk> = embedded
            .into_iter()
            .map(|(_, text, vector)| StoredChunk::new(source.to_string(), text, ingested_at, vector))
            .collect();

        let stored = bounded(
            "chunk insert",
            self.timeout,
            self.vector_store.insert(&records),
        )
        .await?;

        info!("Stored {} of {} chunks from {}", stored, chunk_count, source);
        Ok(stored)
    }
}
