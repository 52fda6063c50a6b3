//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Every query scans all stored vectors, which is fine for the document
//! counts a single assistant deployment holds.

use super::{rank_matches, ChunkMatch, SourceSummary, StoredChunk, VectorStore};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS knowledge_chunks (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    content TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_knowledge_chunks_source ON knowledge_chunks(source);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a vector store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn insert(&self, chunks: &[StoredChunk]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for chunk in chunks {
            tx.execute(
                r#"
                INSERT INTO knowledge_chunks (id, source, content, ingested_at, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    chunk.id.to_string(),
                    chunk.source,
                    chunk.text,
                    chunk.ingested_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                    Self::embedding_to_bytes(&chunk.vector),
                ],
            )?;
        }

        tx.commit()?;
        info!("Inserted {} chunks", chunks.len());
        Ok(chunks.len())
    }

    #[instrument(skip(self, vector))]
    async fn query(&self, vector: &[f32], threshold: f32, limit: usize) -> Result<Vec<ChunkMatch>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, source, content, ingested_at, embedding FROM knowledge_chunks",
        )?;

        let rows = stmt.query_map([], |row| {
            let id_str: String = row.get(0)?;
            let ingested_at: String = row.get(3)?;
            let embedding_bytes: Vec<u8> = row.get(4)?;

            Ok(StoredChunk {
                id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
                source: row.get(1)?,
                text: row.get(2)?,
                ingested_at: Self::parse_timestamp(&ingested_at),
                vector: Self::bytes_to_embedding(&embedding_bytes),
            })
        })?;

        let chunks: Vec<StoredChunk> = rows.filter_map(|r| r.ok()).collect();
        let results = rank_matches(vector, chunks.iter(), threshold, limit);

        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM knowledge_chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT source, COUNT(*) AS chunk_count, MAX(ingested_at) AS ingested_at
            FROM knowledge_chunks
            GROUP BY source
            ORDER BY ingested_at DESC
            "#,
        )?;

        let sources = stmt.query_map([], |row| {
            let ingested_at: String = row.get(2)?;
            Ok(SourceSummary {
                source: row.get(0)?,
                chunk_count: row.get(1)?,
                ingested_at: Self::parse_timestamp(&ingested_at),
            })
        })?;

        Ok(sources.filter_map(|s| s.ok()).collect())
    }
}
