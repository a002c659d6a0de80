//! Normalized source documents and the chunks derived from them

use serde::{Deserialize, Serialize};

/// Where a normalized document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Pdf,
    Confluence,
    Slack,
    Transcript,
}

impl std::fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceOrigin::Pdf => "pdf",
            SourceOrigin::Confluence => "confluence",
            SourceOrigin::Slack => "slack",
            SourceOrigin::Transcript => "transcript",
        };
        f.write_str(s)
    }
}

/// Provenance attached to a [`SourceDocument`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub origin: SourceOrigin,
}

/// A uniform (text, provenance) record produced by the document normalizer.
///
/// Immutable once produced; consumed by the chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: SourceMetadata,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>, metadata: SourceMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// True when the document carries no extractable content
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Provenance attached to a [`Chunk`]: which source it came from and where
/// it sits in that source's chunk sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A size-bounded segment of a source document, ready for embedding.
///
/// Chunks from the same source preserve relative order via `chunk_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}
