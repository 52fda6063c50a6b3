//! Vector store abstraction for Docent.
//!
//! Provides a trait-based interface for different vector database backends.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document chunk stored with its embedding. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique chunk ID.
    pub id: Uuid,
    /// Name of the uploaded document this chunk came from.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// When the document was ingested. Shared by all chunks of one upload.
    pub ingested_at: DateTime<Utc>,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

impl StoredChunk {
    /// Create a new chunk record.
    pub fn new(source: String, text: String, ingested_at: DateTime<Utc>, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            text,
            ingested_at,
            vector,
        }
    }
}

/// A chunk returned by a similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMatch {
    pub source: String,
    pub content: String,
    /// Cosine similarity (higher is better).
    pub similarity: f32,
}

/// Summary information about an ingested source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: String,
    pub chunk_count: u32,
    /// Most recent ingestion of this source.
    pub ingested_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert chunks in one batch. Returns the number stored.
    async fn insert(&self, chunks: &[StoredChunk]) -> Result<usize>;

    /// Nearest neighbours with similarity >= `threshold`, best first, at most `limit`.
    async fn query(&self, vector: &[f32], threshold: f32, limit: usize) -> Result<Vec<ChunkMatch>>;

    /// Total number of stored chunks.
    async fn chunk_count(&self) -> Result<usize>;

    /// Ingested sources, most recent first.
    async fn list_sources(&self) -> Result<Vec<SourceSummary>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score, filter, order and cap candidates. Shared by the store backends.
pub(crate) fn rank_matches<'a>(
    vector: &[f32],
    candidates: impl Iterator<Item = &'a StoredChunk>,
    threshold: f32,
    limit: usize,
) -> Vec<ChunkMatch> {
    let mut results: Vec<ChunkMatch> = candidates
        .map(|chunk| ChunkMatch {
            source: chunk.source.clone(),
            content: chunk.text.clone(),
            similarity: cosine_similarity(vector, &chunk.vector),
        })
        .filter(|m| m.similarity >= threshold)
        .collect();

    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}
