//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::server::AppState;
use anyhow::{Context, Result};
use std::path::Path;

/// Chunk, embed and store a local text file.
pub async fn run_ingest(file: &str, name: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(file);
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let source = name.unwrap_or_else(|| source_name(&path));

    let state = AppState::from_settings(&settings)?;

    let spinner = Output::spinner(&format!("Embedding {}...", source));
    let result = state.ingest.ingest(&source, &content).await;
    spinner.finish_and_clear();

    match result {
        Ok(count) => {
            Output::success(&format!("Saved {} chunks from {}.", count, source));
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            Err(e.into())
        }
    }
}

/// File name used as the stored source.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
