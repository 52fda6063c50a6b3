//! CLI module for Docent.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Docent - retrieval-augmented chat over your own documents
///
/// Serves a chat endpoint that answers questions from uploaded documents,
/// in the asker's language, remembering each conversation.
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP chat and upload server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Chunk, embed and store a text document
    Ingest {
        /// Path to a UTF-8 text file
        file: String,

        /// Source name to store with the chunks (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Ask a single question against the stored documents
    Ask {
        /// The question to ask
        question: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// List ingested documents
    Sources,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Show configuration file path
    Path,
}
