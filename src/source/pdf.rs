//! PDF file source backed by `pdf-extract`

use std::path::PathBuf;

use async_trait::async_trait;

use crate::model::{SourceDocument, SourceMetadata, SourceOrigin};
use crate::source::{DocumentSource, SourceError};

/// Loads a set of local PDF files, one [`SourceDocument`] per file.
pub struct PdfFileSource {
    paths: Vec<PathBuf>,
}

impl PdfFileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl DocumentSource for PdfFileSource {
    fn describe(&self) -> String {
        format!("{} PDF file(s)", self.paths.len())
    }

    async fn load(&self) -> Result<Vec<SourceDocument>, SourceError> {
        let mut documents = Vec::with_capacity(self.paths.len());

        for path in &self.paths {
            let path_display = path.display().to_string();
            if !path.exists() {
                return Err(SourceError::Unreadable {
                    path: path_display,
                    cause: "file does not exist".to_string(),
                });
            }

            // pdf-extract is synchronous and CPU-bound; one file at a time
            // is fine for the single-worker model.
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| SourceError::Unreadable {
                    path: path_display.clone(),
                    cause: e.to_string(),
                })?;

            let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
                SourceError::Extraction {
                    source_id: path_display.clone(),
                    cause: e.to_string(),
                }
            })?;

            tracing::info!(path = %path_display, length = text.len(), "Extracted PDF text");
            if text.trim().is_empty() {
                tracing::warn!(path = %path_display, "PDF yielded no text");
            }

            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned());

            documents.push(SourceDocument::new(
                text,
                SourceMetadata {
                    source_id: path_display,
                    title,
                    origin: SourceOrigin::Pdf,
                },
            ));
        }

        Ok(documents)
    }
}
