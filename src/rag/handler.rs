//! Section-driven report orchestrator
//!
//! Owns one ingestion run: normalize sources, chunk, build the vector
//! index under a fresh per-run directory, then walk the report sections
//! with per-query memoized retrieval. The microservice pass reads the
//! service roster produced by the architecture analysis step and emits
//! one summary per service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::llm::{CompletionProvider, CompletionRequest, EmbeddingProvider, LlmError};
use crate::rag::chunker::{Chunker, ChunkingError};
use crate::rag::index::{IndexError, VectorIndex};
use crate::rag::prompts::{
    self, SectionPrompt, CORE_SECTIONS, MICROSERVICE_SUMMARY, REUSED_SECTIONS,
};
use crate::source::{normalize_sources, DocumentSource, SourceError};

/// Retrieval depth per section query.
const SECTION_TOP_K: usize = 10;
const SECTION_MAX_TOKENS: u32 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("completion failed: {0}")]
    Llm(#[from] LlmError),

    #[error("unknown report section '{0}'")]
    UnknownSection(String),

    #[error("no documents ingested; call ingest before generating a report")]
    NotIngested,

    #[error("service roster at {path} is unusable: {cause}")]
    Services { path: String, cause: String },
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ServiceRoster {
    services: Vec<ServiceEntry>,
}

/// Output of one report run: the combined document plus the individual
/// section bodies keyed by section name.
#[derive(Debug)]
pub struct RagReport {
    pub combined: String,
    pub sections: HashMap<String, String>,
}

/// One-shot RAG pipeline instance.
///
/// Every handler owns a fresh persist directory, so distinct runs never
/// share or clobber each other's collections.
pub struct RagHandler<'a> {
    completions: &'a dyn CompletionProvider,
    embeddings: &'a dyn EmbeddingProvider,
    persist_dir: PathBuf,
    assessment_id: String,
    index: Option<VectorIndex>,
}

impl<'a> RagHandler<'a> {
    pub fn new(
        completions: &'a dyn CompletionProvider,
        embeddings: &'a dyn EmbeddingProvider,
        index_root: &Path,
        assessment_id: impl Into<String>,
    ) -> Self {
        let assessment_id = assessment_id.into();
        let persist_dir = index_root.join(uuid::Uuid::new_v4().to_string());
        tracing::info!(
            assessment = %assessment_id,
            persist_dir = %persist_dir.display(),
            "Initialized RAG handler"
        );
        Self {
            completions,
            embeddings,
            persist_dir,
            assessment_id,
            index: None,
        }
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    /// Normalize, chunk and index the given sources.
    pub async fn ingest(
        &mut self,
        url_source: Option<&dyn DocumentSource>,
        file_sources: &[Box<dyn DocumentSource>],
    ) -> Result<usize, RagError> {
        let documents = normalize_sources(url_source, file_sources).await?;
        let chunks = Chunker::default().split(&documents)?;

        let index = VectorIndex::build_or_load(
            self.embeddings,
            chunks,
            &self.persist_dir,
            "docs",
        )
        .await?;

        tracing::info!(
            assessment = %self.assessment_id,
            chunks = index.len(),
            "Ingestion complete"
        );
        let size = index.len();
        self.index = Some(index);
        Ok(size)
    }

    fn index(&self) -> Result<&VectorIndex, RagError> {
        self.index.as_ref().ok_or(RagError::NotIngested)
    }

    /// Retrieve context for a query, memoizing per distinct query text so
    /// a report run embeds each query at most once.
    async fn context_for(
        &self,
        cache: &mut HashMap<String, String>,
        query: String,
    ) -> Result<String, RagError> {
        if let Some(cached) = cache.get(&query) {
            return Ok(cached.clone());
        }
        let context = self
            .index()?
            .context_for(self.embeddings, &query, SECTION_TOP_K)
            .await?;
        cache.insert(query, context.clone());
        Ok(context)
    }

    async fn answer_section(
        &self,
        prompt: &SectionPrompt,
        context: &str,
        service: Option<&str>,
    ) -> Result<String, RagError> {
        let messages = prompt.build_messages(context, service);
        let request = CompletionRequest::new(messages, SECTION_MAX_TOKENS);
        Ok(self.completions.complete(request).await?)
    }

    /// Produce the full architecture report.
    ///
    /// Walks the core sections, then summarises each service listed in the
    /// roster file. A missing or malformed roster fails the run.
    pub async fn generate_report(&self, services_path: &Path) -> Result<RagReport, RagError> {
        self.index()?;

        let mut combined = String::new();
        let mut sections = HashMap::new();
        let mut context_cache: HashMap<String, String> = HashMap::new();

        for key in CORE_SECTIONS {
            let prompt = prompts::section_prompt(key)
                .ok_or_else(|| RagError::UnknownSection((*key).to_string()))?;

            let header = section_header(key);
            combined.push_str(&header);

            let context = match prompt.query_for(None) {
                Some(query) => self.context_for(&mut context_cache, query).await?,
                None => String::new(),
            };

            let result = self.answer_section(prompt, &context, None).await?;
            tracing::info!(section = key, length = result.len(), "Section generated");

            combined.push_str(&result);
            sections.insert((*key).to_string(), section_body(key, &result));
        }

        let roster = load_roster(services_path)?;
        combined.push_str("\n# Microservice Summaries\n");

        let prompt = prompts::section_prompt(MICROSERVICE_SUMMARY)
            .ok_or_else(|| RagError::UnknownSection(MICROSERVICE_SUMMARY.to_string()))?;

        for service in &roster {
            let context = match prompt.query_for(Some(service)) {
                Some(query) => self.context_for(&mut context_cache, query).await?,
                None => String::new(),
            };

            let result = self.answer_section(prompt, &context, Some(service)).await?;
            tracing::info!(service = %service, "Microservice summary generated");

            combined.push_str(&format!("\n## {service} Microservice\n"));
            combined.push_str(&result);
        }

        Ok(RagReport { combined, sections })
    }
}

fn section_header(key: &str) -> String {
    format!("\n# {}\n", title_case(key))
}

fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Body stored for a section. Headers echoed by the model are stripped
/// only from the sections reused as additional info; the rest keep the
/// model output untouched.
fn section_body(key: &str, result: &str) -> String {
    if REUSED_SECTIONS.contains(&key) {
        strip_header(key, result)
    } else {
        result.to_string()
    }
}

/// The model sometimes echoes the section header; drop it from the stored
/// section body so downstream consumers do not double it.
fn strip_header(key: &str, result: &str) -> String {
    let title = title_case(key);
    result
        .replace(&format!("# {title}\n"), "")
        .replace(&format!("# {title}"), "")
        .trim()
        .to_string()
}

fn load_roster(path: &Path) -> Result<Vec<String>, RagError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| RagError::Services {
        path: display.clone(),
        cause: e.to_string(),
    })?;
    let roster: ServiceRoster = serde_json::from_slice(&bytes).map_err(|e| RagError::Services {
        path: display,
        cause: e.to_string(),
    })?;
    Ok(roster.services.into_iter().map(|s| s.name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::source::TranscriptSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticCompleter {
        calls: AtomicUsize,
    }

    impl StaticCompleter {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for StaticCompleter {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let user = &request.messages[1].content;
            Ok(format!("Answer for: {}", &user[..user.len().min(40)]))
        }
    }

    struct FixedEmbedder {
        batches: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new() -> Self {
            Self {
                batches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0, (t.bytes().map(u32::from).sum::<u32>() % 31) as f32])
                .collect())
        }
    }

    fn transcript() -> Box<dyn DocumentSource> {
        Box::new(TranscriptSource::new(
            "meeting",
            "The platform has a billing service and an auth service. \
             Billing integrates with Stripe over HTTPS. Auth issues OIDC tokens. \
             Nightly jobs reconcile invoices against the ledger.",
        ))
    }

    fn write_roster(dir: &Path, names: &[&str]) -> PathBuf {
        let entries: Vec<serde_json::Value> = names
            .iter()
            .map(|n| serde_json::json!({"Name": n}))
            .collect();
        let path = dir.join("microservices.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&serde_json::json!({"services": entries})).unwrap(),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn report_covers_sections_and_services() {
        let dir = tempfile::tempdir().unwrap();
        let completer = StaticCompleter::new();
        let embedder = FixedEmbedder::new();

        let mut handler = RagHandler::new(&completer, &embedder, dir.path(), "a-1");
        let sources = vec![transcript()];
        handler.ingest(None, &sources).await.unwrap();

        let roster_path = write_roster(dir.path(), &["billing", "auth"]);
        let report = handler.generate_report(&roster_path).await.unwrap();

        assert!(report.combined.contains("# Introduction"));
        assert!(report.combined.contains("# Functional Flows"));
        assert!(report.combined.contains("# Third Party Integrations"));
        assert!(report.combined.contains("## billing Microservice"));
        assert!(report.combined.contains("## auth Microservice"));

        assert!(report.sections.contains_key("functional_flows"));
        assert!(report.sections.contains_key("third_party_integrations"));

        // Three core sections plus two service summaries.
        assert_eq!(completer.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn missing_roster_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let completer = StaticCompleter::new();
        let embedder = FixedEmbedder::new();

        let mut handler = RagHandler::new(&completer, &embedder, dir.path(), "a-2");
        let sources = vec![transcript()];
        handler.ingest(None, &sources).await.unwrap();

        let err = handler
            .generate_report(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Services { .. }));
    }

    #[tokio::test]
    async fn report_without_ingest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let completer = StaticCompleter::new();
        let embedder = FixedEmbedder::new();

        let handler = RagHandler::new(&completer, &embedder, dir.path(), "a-3");
        let roster_path = write_roster(dir.path(), &["billing"]);

        let err = handler.generate_report(&roster_path).await.unwrap_err();
        assert!(matches!(err, RagError::NotIngested));
        assert_eq!(completer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_queries_hit_the_context_cache() {
        let dir = tempfile::tempdir().unwrap();
        let completer = StaticCompleter::new();
        let embedder = FixedEmbedder::new();

        let mut handler = RagHandler::new(&completer, &embedder, dir.path(), "a-4");
        let sources = vec![transcript()];
        handler.ingest(None, &sources).await.unwrap();
        let after_ingest = embedder.batches.load(Ordering::SeqCst);

        // Duplicate service names share one retrieval.
        let roster_path = write_roster(dir.path(), &["billing", "billing"]);
        handler.generate_report(&roster_path).await.unwrap();

        // Three section queries plus one distinct service query.
        let query_batches = embedder.batches.load(Ordering::SeqCst) - after_ingest;
        assert_eq!(query_batches, 4);
    }

    #[test]
    fn echoed_headers_are_stripped_only_from_reused_sections() {
        assert_eq!(
            section_body("functional_flows", "# Functional Flows\nFlow list."),
            "Flow list."
        );
        assert_eq!(
            section_body("introduction", "# Introduction\nIntro text."),
            "# Introduction\nIntro text."
        );
    }

    #[test]
    fn distinct_handlers_use_distinct_persist_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let completer = StaticCompleter::new();
        let embedder = FixedEmbedder::new();

        let a = RagHandler::new(&completer, &embedder, dir.path(), "x");
        let b = RagHandler::new(&completer, &embedder, dir.path(), "x");
        assert_ne!(a.persist_dir(), b.persist_dir());
    }
}
