//! CLI output formatting utilities.

use chrono::{DateTime, Local, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print an ingested document.
    pub fn source_info(source: &str, chunks: u32, ingested_at: DateTime<Utc>) {
        println!(
            "  {} {} ({} chunks, {})",
            style("*").cyan(),
            style(source).bold(),
            chunks,
            style(ingested_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")).dim()
        );
    }

    /// Print an answer, rendering the error span as a red message.
    pub fn answer(text: &str) {
        match strip_error_span(text) {
            Some(message) => eprintln!("\n{}\n", style(message).red()),
            None => println!("\n{}\n", text),
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(spinner_style);
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Inner text of an error-span answer.
fn strip_error_span(text: &str) -> Option<&str> {
    text.strip_prefix(crate::markup::ERROR_SPAN_OPEN)?
        .strip_suffix("</span>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::error_span;

    #[test]
    fn test_strip_error_span() {
        assert_eq!(strip_error_span(&error_span("Sorry")), Some("Sorry"));
        assert_eq!(strip_error_span("Plain answer"), None);
    }
}
