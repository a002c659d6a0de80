//! LLM-driven architecture analysis and threat assessment
//!
//! The crate covers two cooperating halves. The RAG half ingests design
//! material (PDFs, wiki exports, transcripts), chunks and embeds it into a
//! per-run vector collection and generates a sectioned architecture
//! report. The assessment half chains four LLM stages over that material:
//! threat model, attack tree, DREAD scoring and mitigations, all persisted
//! as JSON artifacts in a per-assessment store.

pub mod llm;
pub mod model;
pub mod rag;
pub mod service;
pub mod source;
pub mod store;

pub use model::{Config, ConfigError, LlmMethod};
pub use service::{ApplicationProfile, AssessmentPipeline, PipelineError};
pub use store::{ArtifactKind, ArtifactStore, StoreError};
