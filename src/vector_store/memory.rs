//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{rank_matches, ChunkMatch, SourceSummary, StoredChunk, VectorStore};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector store.
pub struct MemoryVectorStore {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> DocentError {
        DocentError::VectorStore(format!("Lock poisoned: {}", e))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert(&self, chunks: &[StoredChunk]) -> Result<usize> {
        let mut store = self.chunks.write().map_err(Self::poisoned)?;
        store.extend_from_slice(chunks);
        Ok(chunks.len())
    }

    async fn query(&self, vector: &[f32], threshold: f32, limit: usize) -> Result<Vec<ChunkMatch>> {
        let store = self.chunks.read().map_err(Self::poisoned)?;
        Ok(rank_matches(vector, store.iter(), threshold, limit))
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.chunks.read().map_err(Self::poisoned)?.len())
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let store = self.chunks.read().map_err(Self::poisoned)?;

        let mut by_source: HashMap<String, SourceSummary> = HashMap::new();
        for chunk in store.iter() {
            let entry = by_source
                .entry(chunk.source.clone())
                .or_insert_with(|| SourceSummary {
                    source: chunk.source.clone(),
                    chunk_count: 0,
                    ingested_at: chunk.ingested_at,
                });
            entry.chunk_count += 1;
            if chunk.ingested_at > entry.ingested_at {
                entry.ingested_at = chunk.ingested_at;
            }
        }

        let mut sources: Vec<SourceSummary> = by_source.into_values().collect();
        sources.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at));
        Ok(sources)
    }
}
