//! Boundary-preserving text chunker
//!
//! Splits normalized documents into size-bounded, overlapping chunks for
//! embedding. Splitting prefers paragraph breaks, then line breaks, then
//! sentence-final punctuation, then spaces, then a hard cut, so semantic
//! units stay intact where possible. Consecutive chunks of the same source
//! share a small overlap to preserve cross-boundary context for retrieval.

use crate::model::{Chunk, ChunkMetadata, SourceDocument};

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Boundary preference order. The empty separator is the hard-cut terminal.
const SEPARATORS: &[&str] = &["\n\n", "\n", ".", " ", ""];

#[derive(Debug, thiserror::Error)]
pub enum ChunkingError {
    #[error("no chunks could be produced from {0} document(s)")]
    NoChunks(usize),
}

/// Recursive character splitter with provenance-preserving output.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// Panics if `overlap >= chunk_size`; the overlap must leave room for
    /// fresh content in every chunk.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        assert!(
            overlap < chunk_size,
            "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
        );
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Split documents into chunks.
    ///
    /// Blank documents are skipped with a warning; partial success is
    /// tolerated. Fails only when the entire input yields zero chunks.
    pub fn split(&self, documents: &[SourceDocument]) -> Result<Vec<Chunk>, ChunkingError> {
        let mut all_chunks = Vec::new();

        for document in documents {
            if document.is_blank() {
                tracing::warn!(
                    source_id = %document.metadata.source_id,
                    "Skipping blank document during chunking"
                );
                continue;
            }

            let texts = self.split_text(&document.text);
            if texts.is_empty() {
                tracing::warn!(
                    source_id = %document.metadata.source_id,
                    "Document produced no chunks"
                );
                continue;
            }

            let total = texts.len();
            tracing::info!(
                source_id = %document.metadata.source_id,
                chunks = total,
                "Split document"
            );

            all_chunks.extend(texts.into_iter().enumerate().map(|(index, text)| Chunk {
                text,
                metadata: ChunkMetadata {
                    source_id: document.metadata.source_id.clone(),
                    chunk_index: index,
                    total_chunks: total,
                },
            }));
        }

        if all_chunks.is_empty() {
            return Err(ChunkingError::NoChunks(documents.len()));
        }
        Ok(all_chunks)
    }

    /// Split a single text into overlapping chunk strings.
    ///
    /// Core segments never exceed `chunk_size - overlap` bytes and their
    /// concatenation reproduces the input exactly; each chunk after the
    /// first is prefixed with the tail of the previous core, so no chunk
    /// exceeds `chunk_size`.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let core_max = self.chunk_size - self.overlap;
        let pieces = split_recursive(text, SEPARATORS, core_max);
        let cores = merge_pieces(pieces, core_max);

        let mut chunks: Vec<String> = Vec::with_capacity(cores.len());
        for (i, core) in cores.iter().enumerate() {
            if i == 0 {
                chunks.push(core.clone());
            } else {
                let prev = &cores[i - 1];
                let tail_start = floor_char_boundary(prev, prev.len().saturating_sub(self.overlap));
                let mut chunk = String::with_capacity(self.overlap + core.len());
                chunk.push_str(&prev[tail_start..]);
                chunk.push_str(core);
                chunks.push(chunk);
            }
        }
        chunks
    }
}

/// Split `text` into pieces no longer than `max_len`, preferring earlier
/// separators. Separators stay attached to the preceding piece, so the
/// concatenation of the pieces equals the input.
fn split_recursive(text: &str, separators: &[&str], max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return hard_split(text, max_len);
    };
    if sep.is_empty() {
        return hard_split(text, max_len);
    }
    if !text.contains(sep) {
        return split_recursive(text, rest, max_len);
    }

    let mut pieces = Vec::new();
    for part in text.split_inclusive(sep) {
        if part.len() <= max_len {
            pieces.push(part.to_string());
        } else {
            pieces.extend(split_recursive(part, rest, max_len));
        }
    }
    pieces
}

/// Terminal splitter: cut every `max_len` bytes, snapped back to a char
/// boundary, always making progress.
fn hard_split(text: &str, max_len: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let mut cut = floor_char_boundary(remaining, remaining.len().min(max_len));
        if cut == 0 {
            cut = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }
        pieces.push(remaining[..cut].to_string());
        remaining = &remaining[cut..];
    }
    pieces
}

/// Greedily merge adjacent pieces up to `max_len` bytes per segment.
fn merge_pieces(pieces: Vec<String>, max_len: usize) -> Vec<String> {
    let mut merged = Vec::new();
    let mut buf = String::new();
    for piece in pieces {
        if !buf.is_empty() && buf.len() + piece.len() > max_len {
            merged.push(std::mem::take(&mut buf));
        }
        buf.push_str(&piece);
    }
    if !buf.is_empty() {
        merged.push(buf);
    }
    merged
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
