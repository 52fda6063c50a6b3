//! CLI command implementations.

mod ask;
mod config;
mod ingest;
mod serve;
mod sources;

pub use ask::run_ask;
pub use config::run_config;
pub use ingest::run_ingest;
pub use serve::run_serve;
pub use sources::run_sources;
