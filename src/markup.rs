//! Markup protection for machine translation.
//!
//! Answers may carry HTML tags (the client renders `<span class="error">`
//! specially). Tags are swapped for numbered placeholders before text is
//! sent to a translator and swapped back afterwards, so they survive
//! byte-for-byte or the translation is rejected.

use crate::error::{DocentError, Result};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Class of the span wrapping user-visible error messages.
pub const ERROR_SPAN_OPEN: &str = "<span class=\"error\">";

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("tag pattern is valid"))
}

fn placeholder_pattern() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\[\[m(\d+)\]\]").expect("placeholder pattern is valid"))
}

/// Wrap a message in the reserved error markup.
pub fn error_span(message: &str) -> String {
    format!("{}{}</span>", ERROR_SPAN_OPEN, message)
}

/// Whether `text` carries the reserved error markup.
pub fn is_error_markup(text: &str) -> bool {
    text.contains("class=\"error\"")
}

/// Text with its markup tags replaced by placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedText {
    pub text: String,
    tags: Vec<String>,
}

impl ProtectedText {
    /// Replace every tag in `text` with a `[[mN]]` placeholder.
    pub fn protect(text: &str) -> Self {
        let mut tags = Vec::new();
        let protected = tag_pattern().replace_all(text, |caps: &Captures| {
            let placeholder = format!("[[m{}]]", tags.len());
            tags.push(caps[0].to_string());
            placeholder
        });

        Self {
            text: protected.into_owned(),
            tags,
        }
    }

    /// Put the original tags back into a translated text.
    ///
    /// Fails if any placeholder went missing, was duplicated or was invented.
    pub fn restore(&self, translated: &str) -> Result<String> {
        if self.tags.is_empty() {
            return Ok(translated.to_string());
        }

        let mut seen = vec![0usize; self.tags.len()];
        for caps in placeholder_pattern().captures_iter(translated) {
            let index: usize = caps[1]
                .parse()
                .map_err(|_| DocentError::Translation("Malformed markup placeholder".into()))?;
            match seen.get_mut(index) {
                Some(count) => *count += 1,
                None => {
                    return Err(DocentError::Translation(format!(
                        "Unknown markup placeholder [[m{}]]",
                        index
                    )))
                }
            }
        }

        if let Some(index) = seen.iter().position(|&count| count != 1) {
            return Err(DocentError::Translation(format!(
                "Markup placeholder [[m{}]] appeared {} times",
                index, seen[index]
            )));
        }

        let restored = placeholder_pattern().replace_all(translated, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| self.tags.get(i))
                .cloned()
                .unwrap_or_default()
        });
        Ok(restored.into_owned())
    }
}
