//! Assessment pipeline orchestration
//!
//! Drives the stage chain against the artifact store. Stage ordering is
//! enforced here: the attack tree, DREAD and mitigation stages all require
//! a persisted threat model and are rejected before any model call when it
//! is absent. Attack tree and DREAD artifacts are optional context for the
//! stages after them.

use std::path::Path;

use serde_json::Value;

use crate::llm::{CompletionProvider, EmbeddingProvider};
use crate::model::{AttackTree, DreadAssessment, ThreatModelReport};
use crate::rag::{RagError, RagHandler, RagReport};
use crate::service::threat_model::ThreatModelRequest;
use crate::service::{attack_tree, dread, mitigation, test_cases, threat_model};
use crate::source::DocumentSource;
use crate::store::{ArtifactKind, ArtifactStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error("assessment {0} has no threat model; generate one first")]
    MissingThreatModel(String),

    #[error("stored {kind} artifact is unusable: {cause}")]
    InvalidArtifact {
        kind: ArtifactKind,
        cause: String,
    },
}

/// Application facts gathered before the first stage runs.
#[derive(Debug, Clone, Default)]
pub struct ApplicationProfile {
    pub app_type: String,
    pub authentication: String,
    pub internet_facing: String,
    pub sensitive_data: String,
    pub app_input: String,
    pub custom_prompt: String,
    pub org_context: String,
}

/// Stage orchestrator bound to one completion backend and one store.
pub struct AssessmentPipeline<'a> {
    completions: &'a dyn CompletionProvider,
    store: &'a ArtifactStore,
}

impl<'a> AssessmentPipeline<'a> {
    pub fn new(completions: &'a dyn CompletionProvider, store: &'a ArtifactStore) -> Self {
        Self { completions, store }
    }

    /// Ingest sources and produce the architecture report, persisting the
    /// report and folding the reusable sections into the additional info.
    pub async fn run_rag(
        &self,
        assessment_id: &str,
        embeddings: &dyn EmbeddingProvider,
        index_root: &Path,
        url_source: Option<&dyn DocumentSource>,
        file_sources: &[Box<dyn DocumentSource>],
        services_path: &Path,
    ) -> Result<RagReport, PipelineError> {
        let mut handler =
            RagHandler::new(self.completions, embeddings, index_root, assessment_id);
        handler.ingest(url_source, file_sources).await?;
        let report = handler.generate_report(services_path).await?;

        self.store.save(
            assessment_id,
            ArtifactKind::RagResult,
            Value::String(report.combined.clone()),
        )?;

        let mut fields = Vec::new();
        for key in crate::rag::prompts::REUSED_SECTIONS {
            if let Some(body) = report.sections.get(*key) {
                fields.push((*key, Value::String(body.clone())));
            }
        }
        if !fields.is_empty() {
            self.store.merge_additional_info(assessment_id, &fields)?;
        }

        Ok(report)
    }

    /// First stage: generate and persist the threat model.
    pub async fn run_threat_model(
        &self,
        assessment_id: &str,
        profile: &ApplicationProfile,
    ) -> Result<ThreatModelReport, PipelineError> {
        let methodology = self.store.methodology(assessment_id)?;
        let request = ThreatModelRequest {
            methodology,
            app_type: profile.app_type.clone(),
            authentication: profile.authentication.clone(),
            internet_facing: profile.internet_facing.clone(),
            sensitive_data: profile.sensitive_data.clone(),
            app_input: profile.app_input.clone(),
            custom_prompt: profile.custom_prompt.clone(),
            org_context: profile.org_context.clone(),
        };

        let output = threat_model::generate(self.completions, &request).await;

        let mut payload = serde_json::to_value(&output.report)
            .map_err(|e| invalid(ArtifactKind::ThreatModel, e))?;
        payload["markdown"] = Value::String(output.markdown.clone());

        self.store
            .save(assessment_id, ArtifactKind::ThreatModel, payload)?;
        self.store
            .record_prompt(assessment_id, "threat_model", &output.prompt)?;

        Ok(output.report)
    }

    /// Second stage: generate and persist the attack tree.
    ///
    /// Rejected without a model call when no threat model exists.
    pub async fn run_attack_tree(
        &self,
        assessment_id: &str,
    ) -> Result<AttackTree, PipelineError> {
        let report = self.require_threat_model(assessment_id)?;
        let methodology = self.store.methodology(assessment_id)?;

        let output = attack_tree::generate(self.completions, &report, &methodology).await;

        let tree_value = serde_json::to_value(&output.tree)
            .map_err(|e| invalid(ArtifactKind::AttackTree, e))?;
        let payload = serde_json::json!({
            "attack_tree": tree_value,
            "markdown": output.mermaid,
            "total_paths": output.tree.total_paths,
        });

        self.store
            .save(assessment_id, ArtifactKind::AttackTree, payload)?;
        self.store
            .record_prompt(assessment_id, "attack_tree", &output.prompt)?;

        Ok(output.tree)
    }

    /// Third stage: DREAD scoring. The attack tree is optional context.
    pub async fn run_dread(
        &self,
        assessment_id: &str,
    ) -> Result<DreadAssessment, PipelineError> {
        let report = self.require_threat_model(assessment_id)?;
        let attack_tree = self.load_attack_tree(assessment_id)?;

        let output = dread::generate(self.completions, &report, attack_tree.as_ref()).await;

        let payload = serde_json::to_value(&output.assessment)
            .map_err(|e| invalid(ArtifactKind::DreadAssessment, e))?;
        self.store
            .save(assessment_id, ArtifactKind::DreadAssessment, payload)?;
        self.store
            .record_prompt(assessment_id, "dread_assessment", &output.prompt)?;

        Ok(output.assessment)
    }

    /// Final stage: mitigations, consuming whatever earlier context exists.
    pub async fn run_mitigations(&self, assessment_id: &str) -> Result<Value, PipelineError> {
        let report = self.require_threat_model(assessment_id)?;
        let attack_tree = self.load_attack_tree(assessment_id)?;
        let dread = self.load_dread(assessment_id)?;

        let output = mitigation::generate(
            self.completions,
            &report,
            attack_tree.as_ref(),
            dread.as_ref(),
        )
        .await;

        let payload = output.payload();
        self.store
            .save(assessment_id, ArtifactKind::Mitigation, payload.clone())?;
        self.store
            .record_prompt(assessment_id, "mitigations", &output.prompt)?;

        Ok(payload)
    }

    /// Supplementary stage: security test cases. Mitigations are optional
    /// context, consumed as stored when present.
    pub async fn run_test_cases(&self, assessment_id: &str) -> Result<Value, PipelineError> {
        let report = self.require_threat_model(assessment_id)?;
        let mitigations = self
            .store
            .load(assessment_id, ArtifactKind::Mitigation)?
            .map(|a| a.result);

        let output =
            test_cases::generate(self.completions, &report, mitigations.as_ref()).await;

        self.store
            .save(assessment_id, ArtifactKind::TestCases, output.suite.clone())?;
        self.store
            .record_prompt(assessment_id, "test_cases", &output.prompt)?;

        Ok(output.suite)
    }

    fn require_threat_model(
        &self,
        assessment_id: &str,
    ) -> Result<ThreatModelReport, PipelineError> {
        let artifact = self
            .store
            .load(assessment_id, ArtifactKind::ThreatModel)?
            .ok_or_else(|| PipelineError::MissingThreatModel(assessment_id.to_string()))?;
        serde_json::from_value(artifact.result)
            .map_err(|e| invalid(ArtifactKind::ThreatModel, e))
    }

    fn load_attack_tree(&self, assessment_id: &str) -> Result<Option<AttackTree>, PipelineError> {
        let Some(artifact) = self.store.load(assessment_id, ArtifactKind::AttackTree)? else {
            return Ok(None);
        };
        let tree_value = artifact
            .result
            .get("attack_tree")
            .cloned()
            .unwrap_or(artifact.result);
        let tree = serde_json::from_value(tree_value)
            .map_err(|e| invalid(ArtifactKind::AttackTree, e))?;
        Ok(Some(tree))
    }

    fn load_dread(&self, assessment_id: &str) -> Result<Option<DreadAssessment>, PipelineError> {
        let Some(artifact) = self.store.load(assessment_id, ArtifactKind::DreadAssessment)?
        else {
            return Ok(None);
        };
        let assessment = serde_json::from_value(artifact.result)
            .map_err(|e| invalid(ArtifactKind::DreadAssessment, e))?;
        Ok(Some(assessment))
    }
}

fn invalid(kind: ArtifactKind, cause: serde_json::Error) -> PipelineError {
    PipelineError::InvalidArtifact {
        kind,
        cause: cause.to_string(),
    }
}
