//! Pre-flight checks before commands that call OpenAI.
//!
//! Fails fast with a readable message instead of a 401 halfway through
//! an ingestion or on the first chat request.

use crate::config::Settings;
use crate::error::{DocentError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Serving needs the API key and a usable data directory.
    Serve,
    /// Ingestion embeds chunks.
    Ingest,
    /// Asking detects, rewrites, embeds and generates.
    Ask,
    /// Listing sources only reads the database.
    Sources,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Serve | Operation::Ingest | Operation::Ask => {
            check_api_key(std::env::var("OPENAI_API_KEY").ok().as_deref())?;
            check_data_dir(settings)?;
        }
        Operation::Sources => {
            check_data_dir(settings)?;
        }
    }
    Ok(())
}

/// Check that an OpenAI API key is configured.
fn check_api_key(key: Option<&str>) -> Result<()> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(DocentError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(DocentError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Make sure the database directory exists.
fn check_data_dir(settings: &Settings) -> Result<()> {
    if let Some(parent) = settings.sqlite_path().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DocentError::Config(format!("Cannot create data directory {:?}: {}", parent, e))
        })?;
    }
    Ok(())
}
