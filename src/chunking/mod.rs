//! Splitting documents into overlapping, embeddable chunks.
//!
//! Sizes are counted in characters. Each cut prefers a paragraph break,
//! then a sentence end, then whitespace, and only splits a word when the
//! window contains none of those. Consecutive chunks share exactly
//! `overlap` characters.

use crate::config::ChunkingSettings;
use crate::error::{DocentError, Result};

/// Character-window chunker with boundary-aware cuts.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DocentError::Config("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(DocentError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered chunks of at most `chunk_size` characters.
    ///
    /// Whitespace-only chunks are dropped. Empty input is rejected.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Err(DocentError::InvalidInput("Text is empty".into()));
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let limit = (start + self.chunk_size).min(chars.len());
            if limit == chars.len() {
                push_chunk(&mut chunks, &chars[start..limit]);
                break;
            }

            let end = self.find_cut(&chars, start, limit);
            push_chunk(&mut chunks, &chars[start..end]);
            start = end - self.overlap;
        }

        Ok(chunks)
    }

    /// Best cut position in `(start + overlap, limit]`.
    fn find_cut(&self, chars: &[char], start: usize, limit: usize) -> usize {
        // Cuts at or before this point would stall the window
        let min_end = start + self.overlap + 1;

        let pair_cut = |is_break: fn(char, char) -> bool| {
            (min_end.max(start + 2)..=limit)
                .rev()
                .find(|&end| is_break(chars[end - 2], chars[end - 1]))
        };

        pair_cut(|a, b| a == '\n' && b == '\n')
            .or_else(|| pair_cut(|a, b| matches!(a, '.' | '!' | '?') && b.is_whitespace()))
            .or_else(|| {
                (min_end..=limit)
                    .rev()
                    .find(|&end| chars[end - 1].is_whitespace())
            })
            .unwrap_or(limit)
    }
}

fn push_chunk(chunks: &mut Vec<String>, chars: &[char]) {
    let chunk: String = chars.iter().collect();
    if !chunk.trim().is_empty() {
        chunks.push(chunk);
    }
}
