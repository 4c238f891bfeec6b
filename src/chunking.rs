//! Chunking utilities for splitting documents into overlapping segments.
//!
//! Text is split recursively: first on blank lines, then on newlines, then
//! on spaces and finally between characters, always preferring the largest
//! boundary that keeps pieces under the chunk size. Small pieces are then
//! merged back into windows of at most `chunk_size` characters, carrying up
//! to `overlap` characters from the end of one window into the next.
//!
//! All lengths and offsets are measured in characters, not bytes.

use std::{collections::VecDeque, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::loader::Document;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1200;

/// Default overlap between chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Split boundaries, from most to least preferred. The empty separator
/// splits between characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Maximum overlap between adjacent chunks in characters.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A chunk of text from a larger document.
///
/// Carries the metadata of its source [`Document`] plus the character
/// offset where it starts in that document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: PathBuf,
    pub page: Option<u32>,
    /// Character offset where this chunk starts in the source document.
    pub start_offset: usize,
}

/// Split every document into chunks, preserving document order.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
///
/// use rag_local::chunking::{ChunkingConfig, chunk_documents};
/// use rag_local::loader::Document;
///
/// let doc = Document {
///     text: "Revenue grew 10% in Q1.".to_string(),
///     source: PathBuf::from("notes.txt"),
///     page: None,
/// };
/// let chunks = chunk_documents(&[doc], ChunkingConfig::default());
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].start_offset, 0);
/// ```
pub fn chunk_documents(
    documents: &[Document],
    config: ChunkingConfig,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for doc in documents {
        let mut start: usize = 0;
        let mut previous_len: usize = 0;

        for text in split_text(&doc.text, config) {
            let search_from =
                (start + previous_len).saturating_sub(config.overlap);
            start = find_chars(&doc.text, &text, search_from)
                .or_else(|| find_chars(&doc.text, &text, 0))
                .unwrap_or(search_from);
            previous_len = text.chars().count();

            chunks.push(Chunk {
                text,
                source: doc.source.clone(),
                page: doc.page,
                start_offset: start,
            });
        }
    }

    chunks
}

/// Split a single text into trimmed, non-empty windows.
///
/// # Examples
///
/// ```
/// use rag_local::chunking::{ChunkingConfig, split_text};
///
/// let config = ChunkingConfig { chunk_size: 12, overlap: 6 };
/// let chunks = split_text("alpha beta gamma delta", config);
/// assert_eq!(chunks, vec!["alpha beta", "beta gamma", "gamma delta"]);
/// ```
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, SEPARATORS, config)
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    config: ChunkingConfig,
) -> Vec<String> {
    // Pick the first separator present in the text; the rest are used to
    // split pieces that are still too long.
    let mut separator = "";
    let mut finer: &[&str] = &[];
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            break;
        }
        if text.contains(sep) {
            separator = sep;
            finer = &separators[i + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut small: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            small.push(piece);
            continue;
        }

        if !small.is_empty() {
            chunks.extend(merge_pieces(&small, config));
            small.clear();
        }
        if finer.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, finer, config));
        }
    }

    if !small.is_empty() {
        chunks.extend(merge_pieces(&small, config));
    }

    chunks
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Greedily merge small pieces into windows of at most `chunk_size`
/// characters, carrying at most `overlap` characters into the next window.
fn merge_pieces(pieces: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut windows = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !current.is_empty() {
            if let Some(window) = join_window(&current) {
                windows.push(window);
            }
            while total > config.overlap
                || (total + len > config.chunk_size && total > 0)
            {
                let Some(first) = current.pop_front() else {
                    break;
                };
                total -= char_len(first);
            }
        }

        current.push_back(piece);
        total += len;
    }

    if let Some(window) = join_window(&current) {
        windows.push(window);
    }
    windows
}

fn join_window(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Find `needle` in `haystack` at or after character index `from`,
/// returning the character index of the match.
fn find_chars(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let from_byte = haystack
        .char_indices()
        .nth(from)
        .map(|(b, _)| b)
        .unwrap_or(haystack.len());
    let found = haystack[from_byte..].find(needle)?;
    Some(char_len(&haystack[..from_byte + found]))
}
