//! Sources command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::{SqliteVectorStore, VectorStore};
use anyhow::Result;

/// List ingested documents.
pub async fn run_sources(settings: Settings) -> Result<()> {
    preflight::check(Operation::Sources, &settings)?;

    let store = SqliteVectorStore::new(&settings.sqlite_path())?;

    match store.list_sources().await {
        Ok(sources) if sources.is_empty() => {
            Output::info("No documents ingested yet. Use 'docent ingest <file>' to add one.");
        }
        Ok(sources) => {
            Output::header(&format!("Ingested Documents ({})", sources.len()));
            println!();

            for source in &sources {
                Output::source_info(&source.source, source.chunk_count, source.ingested_at);
            }

            let total_chunks: u32 = sources.iter().map(|s| s.chunk_count).sum();
            println!();
            Output::kv("Total chunks", &total_chunks.to_string());
        }
        Err(e) => {
            Output::error(&format!("Failed to list documents: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
