//! Inline transcript source (meeting notes, chat excerpts)

use async_trait::async_trait;

use crate::model::{SourceDocument, SourceMetadata, SourceOrigin};
use crate::source::{DocumentSource, SourceError};

/// Wraps text that arrived inline with the request, such as a pasted
/// meeting transcript.
pub struct TranscriptSource {
    source_id: String,
    text: String,
}

impl TranscriptSource {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for TranscriptSource {
    fn describe(&self) -> String {
        format!("transcript '{}'", self.source_id)
    }

    async fn load(&self) -> Result<Vec<SourceDocument>, SourceError> {
        Ok(vec![SourceDocument::new(
            self.text.clone(),
            SourceMetadata {
                source_id: self.source_id.clone(),
                title: None,
                origin: SourceOrigin::Transcript,
            },
        )])
    }
}
