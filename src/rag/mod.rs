//! Retrieval-augmented report generation

pub mod chunker;
pub mod handler;
pub mod index;
pub mod prompts;

pub use chunker::{Chunker, ChunkingError};
pub use handler::{RagError, RagHandler, RagReport};
pub use index::{IndexError, VectorIndex};
