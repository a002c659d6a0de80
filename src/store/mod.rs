//! Filesystem artifact store
//!
//! One directory per assessment id under a configurable root. Every
//! artifact is an opaque JSON document wrapped in a `{timestamp, result}`
//! envelope and overwritten wholesale on regeneration. The store also
//! resolves the per-assessment threat modeling methodology, which every
//! stage prompt-builder requires.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DETAILS_FILE: &str = "details.json";
const METHODOLOGY_KEY: &str = "threatModelingMethodology";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {cause}")]
    Io { path: String, cause: String },

    #[error("invalid JSON at {path}: {cause}")]
    InvalidJson { path: String, cause: String },

    #[error("assessment details not found for {0}")]
    DetailsNotFound(String),

    #[error("no threat modeling methodology configured for assessment {0}")]
    MethodologyMissing(String),
}

impl StoreError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            cause: err.to_string(),
        }
    }
}

/// The artifact kinds an assessment can own, at most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    RagResult,
    ThreatModel,
    AttackTree,
    DreadAssessment,
    Mitigation,
    TestCases,
    Prompts,
    AdditionalInfo,
}

impl ArtifactKind {
    pub const ALL: &'static [ArtifactKind] = &[
        ArtifactKind::RagResult,
        ArtifactKind::ThreatModel,
        ArtifactKind::AttackTree,
        ArtifactKind::DreadAssessment,
        ArtifactKind::Mitigation,
        ArtifactKind::TestCases,
        ArtifactKind::Prompts,
        ArtifactKind::AdditionalInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::RagResult => "rag_result",
            ArtifactKind::ThreatModel => "threat_model",
            ArtifactKind::AttackTree => "attack_tree",
            ArtifactKind::DreadAssessment => "dread_assessment",
            ArtifactKind::Mitigation => "mitigation",
            ArtifactKind::TestCases => "test_cases",
            ArtifactKind::Prompts => "prompts",
            ArtifactKind::AdditionalInfo => "additional_info",
        }
    }

    fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope wrapping every stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub timestamp: DateTime<Utc>,
    pub result: Value,
}

/// Dashboard row: one assessment and whichever artifacts it owns.
#[derive(Debug, Serialize)]
pub struct AssessmentSummary {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub artifacts: Vec<(&'static str, StoredArtifact)>,
}

/// Per-assessment JSON blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| StoreError::io(&base_dir, e))?;
        Ok(Self { base_dir })
    }

    fn assessment_dir(&self, assessment_id: &str) -> PathBuf {
        self.base_dir.join(assessment_id)
    }

    /// Create a fresh assessment directory and return its id.
    pub fn create_assessment(&self) -> Result<String, StoreError> {
        let assessment_id = uuid::Uuid::new_v4().to_string();
        let dir = self.assessment_dir(&assessment_id);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tracing::info!(assessment = %assessment_id, "Created assessment");
        Ok(assessment_id)
    }

    /// Persist an artifact, overwriting any previous one of the same kind.
    pub fn save(
        &self,
        assessment_id: &str,
        kind: ArtifactKind,
        result: Value,
    ) -> Result<(), StoreError> {
        let artifact = StoredArtifact {
            timestamp: Utc::now(),
            result,
        };
        let dir = self.assessment_dir(assessment_id);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(kind.file_name());
        let json = serde_json::to_vec_pretty(&artifact).map_err(|e| StoreError::InvalidJson {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| StoreError::io(&path, e))?;

        tracing::info!(assessment = %assessment_id, kind = %kind, "Saved artifact");
        Ok(())
    }

    /// Load an artifact if it exists.
    pub fn load(
        &self,
        assessment_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        let path = self.assessment_dir(assessment_id).join(kind.file_name());
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        let artifact = serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidJson {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        Ok(Some(artifact))
    }

    /// Resolve the threat modeling methodology for an assessment.
    ///
    /// Absence of the details file or of the methodology key is a hard
    /// error; stage prompt templates cannot be selected without it.
    pub fn methodology(&self, assessment_id: &str) -> Result<String, StoreError> {
        let path = self.assessment_dir(assessment_id).join(DETAILS_FILE);
        if !path.exists() {
            return Err(StoreError::DetailsNotFound(assessment_id.to_string()));
        }
        let bytes = std::fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        let details: Value =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidJson {
                path: path.display().to_string(),
                cause: e.to_string(),
            })?;

        details
            .get(METHODOLOGY_KEY)
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| StoreError::MethodologyMissing(assessment_id.to_string()))
    }

    /// Write assessment details (methodology and friends).
    pub fn save_details(&self, assessment_id: &str, details: &Value) -> Result<(), StoreError> {
        let dir = self.assessment_dir(assessment_id);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let path = dir.join(DETAILS_FILE);
        let json = serde_json::to_vec_pretty(details).map_err(|e| StoreError::InvalidJson {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| StoreError::io(&path, e))
    }

    /// Merge fields into the additional-info artifact, preserving whatever
    /// was already recorded for the assessment.
    pub fn merge_additional_info(
        &self,
        assessment_id: &str,
        fields: &[(&str, Value)],
    ) -> Result<(), StoreError> {
        let mut existing = self
            .load(assessment_id, ArtifactKind::AdditionalInfo)?
            .map(|a| a.result)
            .unwrap_or_else(|| Value::Object(Default::default()));

        if let Value::Object(map) = &mut existing {
            for (key, value) in fields {
                map.insert((*key).to_string(), value.clone());
            }
        } else {
            let mut map = serde_json::Map::new();
            for (key, value) in fields {
                map.insert((*key).to_string(), value.clone());
            }
            existing = Value::Object(map);
        }

        self.save(assessment_id, ArtifactKind::AdditionalInfo, existing)
    }

    /// Record the prompt used by one stage under the prompts artifact,
    /// merging with prompts recorded by earlier stages.
    pub fn record_prompt(
        &self,
        assessment_id: &str,
        stage: &str,
        prompt: &str,
    ) -> Result<(), StoreError> {
        let mut existing = self
            .load(assessment_id, ArtifactKind::Prompts)?
            .map(|a| a.result)
            .unwrap_or_else(|| Value::Object(Default::default()));

        if let Value::Object(map) = &mut existing {
            map.insert(stage.to_string(), Value::String(prompt.to_string()));
        } else {
            let mut map = serde_json::Map::new();
            map.insert(stage.to_string(), Value::String(prompt.to_string()));
            existing = Value::Object(map);
        }

        self.save(assessment_id, ArtifactKind::Prompts, existing)
    }

    /// Remove an assessment and every artifact it owns.
    ///
    /// Deleting an unknown id is a no-op.
    pub fn delete_assessment(&self, assessment_id: &str) -> Result<(), StoreError> {
        let dir = self.assessment_dir(assessment_id);
        if !dir.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tracing::info!(assessment = %assessment_id, "Deleted assessment");
        Ok(())
    }

    /// List every assessment with whichever artifacts exist, newest first.
    pub fn list_assessments(&self) -> Result<Vec<AssessmentSummary>, StoreError> {
        let mut summaries = Vec::new();

        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(summaries),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();

            let mut artifacts = Vec::new();
            let mut timestamp: Option<DateTime<Utc>> = None;
            let mut name: Option<String> = None;

            for kind in ArtifactKind::ALL {
                let Ok(Some(artifact)) = self.load(&id, *kind) else {
                    continue;
                };
                if timestamp.is_none() {
                    timestamp = Some(artifact.timestamp);
                }
                if *kind == ArtifactKind::ThreatModel {
                    name = artifact
                        .result
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                artifacts.push((kind.as_str(), artifact));
            }

            if artifacts.is_empty() {
                continue;
            }

            let short_id: String = id.chars().take(8).collect();
            summaries.push(AssessmentSummary {
                name: name.unwrap_or_else(|| format!("Assessment {short_id}")),
                timestamp: timestamp.unwrap_or_else(Utc::now),
                id,
                artifacts,
            });
        }

        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }
}
