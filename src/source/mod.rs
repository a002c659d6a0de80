//! Document sources and the ingestion normalizer
//!
//! Source-specific loaders (PDF extraction, Confluence, Slack) sit behind
//! the [`DocumentSource`] trait; the normalizer turns whatever they produce
//! into a uniform, non-empty list of [`SourceDocument`] or fails with a
//! typed error.

mod pdf;
mod transcript;

use async_trait::async_trait;

use crate::model::SourceDocument;

pub use pdf::PdfFileSource;
pub use transcript::TranscriptSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no usable documents: {0}")]
    NoDocuments(String),

    #[error("failed to read {path}: {cause}")]
    Unreadable { path: String, cause: String },

    #[error("extraction failed for {source_id}: {cause}")]
    Extraction { source_id: String, cause: String },
}

/// A producer of normalized documents.
///
/// Implementations fail with a [`SourceError`] carrying a human-readable
/// cause; they never return an empty success.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Human-readable description used in logs and error causes
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Vec<SourceDocument>, SourceError>;
}

/// Normalize one ingestion request into a document list.
///
/// Exactly one source type is honored per call: when both a URL-style
/// source and file sources are given, the URL source wins. Blank documents
/// are dropped with a warning. Fails with [`SourceError::NoDocuments`] if
/// the surviving list would be empty.
pub async fn normalize_sources(
    url_source: Option<&dyn DocumentSource>,
    file_sources: &[Box<dyn DocumentSource>],
) -> Result<Vec<SourceDocument>, SourceError> {
    let loaded = match url_source {
        Some(source) => {
            tracing::info!(source = %source.describe(), "Normalizing URL source");
            source.load().await?
        }
        None => {
            if file_sources.is_empty() {
                return Err(SourceError::NoDocuments("no sources provided".to_string()));
            }
            let loads = file_sources.iter().map(|source| {
                tracing::info!(source = %source.describe(), "Normalizing file source");
                source.load()
            });
            futures::future::try_join_all(loads)
                .await?
                .into_iter()
                .flatten()
                .collect()
        }
    };

    let total = loaded.len();
    let documents: Vec<SourceDocument> = loaded
        .into_iter()
        .filter(|doc| {
            if doc.is_blank() {
                tracing::warn!(
                    source_id = %doc.metadata.source_id,
                    "Dropping blank document"
                );
                false
            } else {
                true
            }
        })
        .collect();

    if documents.is_empty() {
        return Err(SourceError::NoDocuments(format!(
            "{total} document(s) loaded, none with extractable text"
        )));
    }

    tracing::info!(count = documents.len(), "Normalized source documents");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceMetadata, SourceOrigin};

    struct FixedSource {
        name: &'static str,
        docs: Vec<SourceDocument>,
    }

    #[async_trait]
    impl DocumentSource for FixedSource {
        fn describe(&self) -> String {
            self.name.to_string()
        }

        async fn load(&self) -> Result<Vec<SourceDocument>, SourceError> {
            Ok(self.docs.clone())
        }
    }

    fn doc(id: &str, text: &str) -> SourceDocument {
        SourceDocument::new(
            text,
            SourceMetadata {
                source_id: id.to_string(),
                title: None,
                origin: SourceOrigin::Transcript,
            },
        )
    }

    #[tokio::test]
    async fn url_source_takes_precedence_over_files() {
        let url = FixedSource {
            name: "wiki",
            docs: vec![doc("wiki-1", "wiki content")],
        };
        let files: Vec<Box<dyn DocumentSource>> = vec![Box::new(FixedSource {
            name: "file",
            docs: vec![doc("file-1", "file content")],
        })];

        let documents = normalize_sources(Some(&url), &files).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].metadata.source_id, "wiki-1");
    }

    #[tokio::test]
    async fn empty_input_is_an_error() {
        let err = normalize_sources(None, &[]).await.unwrap_err();
        assert!(matches!(err, SourceError::NoDocuments(_)));
    }

    #[tokio::test]
    async fn all_blank_documents_is_an_error() {
        let files: Vec<Box<dyn DocumentSource>> = vec![Box::new(FixedSource {
            name: "file",
            docs: vec![doc("a", "   "), doc("b", "\n\t")],
        })];
        let err = normalize_sources(None, &files).await.unwrap_err();
        assert!(matches!(err, SourceError::NoDocuments(_)));
    }

    #[tokio::test]
    async fn blank_documents_are_dropped_not_fatal() {
        let files: Vec<Box<dyn DocumentSource>> = vec![Box::new(FixedSource {
            name: "file",
            docs: vec![doc("a", "   "), doc("b", "real content")],
        })];
        let documents = normalize_sources(None, &files).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].metadata.source_id, "b");
    }
}
