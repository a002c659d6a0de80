//! Persisted per-assessment vector index
//!
//! One collection per ingestion run, persisted as a directory holding
//! `collection.json` (chunks + dimensions) and `vectors.bin` (little-endian
//! f32 blob). An existing directory is loaded as-is, never re-embedded or
//! overwritten; a failed build removes its partial directory.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::llm::{EmbeddingProvider, LlmError};
use crate::model::Chunk;

const COLLECTION_FILE: &str = "collection.json";
const VECTORS_FILE: &str = "vectors.bin";

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("collection '{0}' contains no vectors")]
    EmptyCollection(String),

    #[error("I/O error at {path}: {cause}")]
    Io { path: String, cause: String },

    #[error("corrupt collection at {path}: {cause}")]
    Corrupt { path: String, cause: String },
}

impl IndexError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        IndexError::Io {
            path: path.display().to_string(),
            cause: err.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CollectionManifest {
    collection_name: String,
    dims: usize,
    chunks: Vec<Chunk>,
}

/// An embedded similarity index over one assessment's chunks.
#[derive(Debug)]
pub struct VectorIndex {
    collection_name: String,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Load the collection persisted at `persist_path`, or embed `chunks`
    /// and persist a fresh one there.
    ///
    /// Reopening an existing path is idempotent: no re-embedding, no
    /// duplication. A build that fails after creating the directory cleans
    /// it up so a corrupt index is never left behind.
    pub async fn build_or_load(
        provider: &dyn EmbeddingProvider,
        chunks: Vec<Chunk>,
        persist_path: &Path,
        collection_name: &str,
    ) -> Result<Self, IndexError> {
        if persist_path.exists() {
            let index = Self::load(persist_path)?;
            tracing::info!(
                path = %persist_path.display(),
                size = index.len(),
                "Loaded existing vector collection"
            );
            return Ok(index);
        }

        match Self::build(provider, chunks, persist_path, collection_name).await {
            Ok(index) => Ok(index),
            Err(e) => {
                if persist_path.exists() {
                    if let Err(cleanup) = std::fs::remove_dir_all(persist_path) {
                        tracing::warn!(
                            path = %persist_path.display(),
                            error = %cleanup,
                            "Failed to clean up partial collection"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn build(
        provider: &dyn EmbeddingProvider,
        chunks: Vec<Chunk>,
        persist_path: &Path,
        collection_name: &str,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyCollection(collection_name.to_string()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = provider.embed(&texts).await?;

        if vectors.is_empty() {
            return Err(IndexError::EmptyCollection(collection_name.to_string()));
        }

        let dims = vectors[0].len();
        std::fs::create_dir_all(persist_path).map_err(|e| IndexError::io(persist_path, e))?;

        let manifest = CollectionManifest {
            collection_name: collection_name.to_string(),
            dims,
            chunks: chunks.clone(),
        };
        let manifest_path = persist_path.join(COLLECTION_FILE);
        let manifest_json =
            serde_json::to_vec_pretty(&manifest).map_err(|e| IndexError::Corrupt {
                path: manifest_path.display().to_string(),
                cause: e.to_string(),
            })?;
        std::fs::write(&manifest_path, manifest_json)
            .map_err(|e| IndexError::io(&manifest_path, e))?;

        let vectors_path = persist_path.join(VECTORS_FILE);
        std::fs::write(&vectors_path, vectors_to_blob(&vectors))
            .map_err(|e| IndexError::io(&vectors_path, e))?;

        tracing::info!(
            path = %persist_path.display(),
            collection = collection_name,
            size = vectors.len(),
            dims,
            "Created vector collection"
        );

        Ok(Self {
            collection_name: collection_name.to_string(),
            chunks,
            vectors,
        })
    }

    fn load(persist_path: &Path) -> Result<Self, IndexError> {
        let manifest_path = persist_path.join(COLLECTION_FILE);
        let manifest_bytes =
            std::fs::read(&manifest_path).map_err(|e| IndexError::io(&manifest_path, e))?;
        let manifest: CollectionManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|e| IndexError::Corrupt {
                path: manifest_path.display().to_string(),
                cause: e.to_string(),
            })?;

        let vectors_path = persist_path.join(VECTORS_FILE);
        let blob = std::fs::read(&vectors_path).map_err(|e| IndexError::io(&vectors_path, e))?;
        let vectors = blob_to_vectors(&blob, manifest.dims).ok_or_else(|| IndexError::Corrupt {
            path: vectors_path.display().to_string(),
            cause: format!("blob length not a multiple of {} dims", manifest.dims),
        })?;

        if vectors.len() != manifest.chunks.len() {
            return Err(IndexError::Corrupt {
                path: persist_path.display().to_string(),
                cause: format!(
                    "{} vectors for {} chunks",
                    vectors.len(),
                    manifest.chunks.len()
                ),
            });
        }
        if vectors.is_empty() {
            return Err(IndexError::EmptyCollection(manifest.collection_name));
        }

        Ok(Self {
            collection_name: manifest.collection_name,
            chunks: manifest.chunks,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Return the top-`k` chunks by cosine similarity to `text`.
    ///
    /// `k` is clamped to the collection size, so over-asking a small
    /// collection never fails.
    pub async fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<&Chunk>, IndexError> {
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = provider
            .embed(std::slice::from_ref(&text.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::EmptyCollection(self.collection_name.clone()))?;

        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&query_vec, v)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        tracing::debug!(
            collection = %self.collection_name,
            requested = k,
            size = self.len(),
            "Ranked similarity query"
        );

        Ok(ranked.into_iter().map(|(i, _)| &self.chunks[i]).collect())
    }

    /// Retrieve context for a query: top-`k` chunk texts concatenated in
    /// similarity-rank order (not deduplicated).
    pub async fn context_for(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> Result<String, IndexError> {
        let chunks = self.query(provider, query, k).await?;
        Ok(chunks.iter().map(|c| c.text.as_str()).collect())
    }
}

/// Encode vectors as little-endian f32 bytes.
fn vectors_to_blob(vectors: &[Vec<f32>]) -> Vec<u8> {
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    let mut bytes = Vec::with_capacity(vectors.len() * dims * 4);
    for vector in vectors {
        for value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// Decode a blob back into `dims`-wide vectors. Returns `None` when the
/// blob length does not divide evenly.
fn blob_to_vectors(blob: &[u8], dims: usize) -> Option<Vec<Vec<f32>>> {
    if dims == 0 || blob.len() % (dims * 4) != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(dims * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect(),
    )
}

/// Cosine similarity in [-1, 1]; 0.0 for mismatched or empty vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChunkMetadata;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: maps each text to a 4-dim vector derived
    /// from its bytes, and counts batch calls.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let sum: u32 = t.bytes().map(u32::from).sum();
                    vec![
                        (sum % 97) as f32,
                        t.len() as f32,
                        t.chars().count() as f32,
                        1.0,
                    ]
                })
                .collect())
        }
    }

    fn chunk(source: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source_id: source.to_string(),
                chunk_index: index,
                total_chunks: 3,
            },
        }
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            chunk("doc", 0, "The payment service talks to Stripe."),
            chunk("doc", 1, "Authentication uses OIDC with short tokens."),
            chunk("doc", 2, "Batch jobs run nightly against the warehouse."),
        ]
    }

    #[tokio::test]
    async fn build_then_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-1");
        let embedder = CountingEmbedder::new();

        let built = VectorIndex::build_or_load(&embedder, sample_chunks(), &path, "docs")
            .await
            .unwrap();
        assert_eq!(built.len(), 3);
        assert_eq!(embedder.call_count(), 1);

        let reopened = VectorIndex::build_or_load(&embedder, sample_chunks(), &path, "docs")
            .await
            .unwrap();
        assert_eq!(reopened.len(), 3);
        // No re-embedding on reopen.
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_chunks_fail_and_leave_no_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-2");
        let embedder = CountingEmbedder::new();

        let err = VectorIndex::build_or_load(&embedder, Vec::new(), &path, "docs")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::EmptyCollection(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn query_clamps_k_to_collection_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-3");
        let embedder = CountingEmbedder::new();

        let index = VectorIndex::build_or_load(&embedder, sample_chunks(), &path, "docs")
            .await
            .unwrap();
        let results = index.query(&embedder, "payments", 10).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn context_concatenates_in_rank_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-4");
        let embedder = CountingEmbedder::new();

        let index = VectorIndex::build_or_load(&embedder, sample_chunks(), &path, "docs")
            .await
            .unwrap();
        let ranked = index.query(&embedder, "nightly jobs", 3).await.unwrap();
        let context = index.context_for(&embedder, "nightly jobs", 3).await.unwrap();

        let expected: String = ranked.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(context, expected);
    }

    #[test]
    fn blob_roundtrip() {
        let vectors = vec![vec![1.0f32, -2.5, 3.125], vec![0.0, 0.5, -0.5]];
        let blob = vectors_to_blob(&vectors);
        assert_eq!(blob_to_vectors(&blob, 3).unwrap(), vectors);
        assert!(blob_to_vectors(&blob, 4).is_none());
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
