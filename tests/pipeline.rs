//! End-to-end pipeline tests against scripted providers.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use threatsmith::llm::{
    CompletionProvider, CompletionRequest, EmbeddingProvider, LlmError,
};
use threatsmith::service::{ApplicationProfile, AssessmentPipeline, PipelineError};
use threatsmith::source::{DocumentSource, TranscriptSource};
use threatsmith::store::{ArtifactKind, ArtifactStore};

/// Pops scripted responses in order; repeats the last one when exhausted.
struct ScriptedCompleter {
    responses: Mutex<VecDeque<String>>,
    last: String,
    calls: AtomicUsize,
}

impl ScriptedCompleter {
    fn new(responses: &[&str]) -> Self {
        let queue: VecDeque<String> = responses.iter().map(|s| s.to_string()).collect();
        let last = queue.back().cloned().unwrap_or_default();
        Self {
            responses: Mutex::new(queue),
            last,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompleter {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.responses.lock().unwrap();
        Ok(queue.pop_front().unwrap_or_else(|| self.last.clone()))
    }
}

struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts
            .iter()
            .map(|t| {
                let sum: u32 = t.bytes().map(u32::from).sum();
                vec![(sum % 101) as f32, t.len() as f32, 1.0]
            })
            .collect())
    }
}

fn threat_model_response() -> String {
    json!({
        "threat_model": [{
            "Threat Type": "Spoofing",
            "Scenario": "Replayed session tokens grant account access",
            "Potential Impact": "Account takeover"
        }],
        "improvement_suggestions": ["Rotate tokens aggressively"]
    })
    .to_string()
}

fn attack_tree_response() -> String {
    json!({
        "nodes": [{
            "id": "root",
            "type": "goal",
            "label": "Compromise accounts",
            "children": [{
                "id": "a1",
                "type": "attack",
                "label": "Token replay",
                "children": [{
                    "id": "v1",
                    "type": "vulnerability",
                    "label": "Long-lived tokens"
                }]
            }]
        }]
    })
    .to_string()
}

fn dread_response() -> String {
    json!({
        "Risk Assessment": [{
            "Threat Type": "Spoofing",
            "Scenario": "Replayed session tokens grant account access",
            "Damage Potential": 8,
            "Reproducibility": 7,
            "Exploitability": 6,
            "Affected Users": 9,
            "Discoverability": 5
        }]
    })
    .to_string()
}

fn mitigation_response() -> String {
    json!({
        "mitigations": [{
            "Threat Type": "Spoofing",
            "Scenario": "Replayed session tokens grant account access",
            "Suggested Mitigation(s)": "Bind tokens to the client and shorten their lifetime"
        }]
    })
    .to_string()
}

fn test_cases_response() -> String {
    json!({
        "test_cases": [{
            "title": "Replay a captured session token",
            "description": "Verify replayed tokens are rejected",
            "test_steps": "Capture a valid token, replay it from another client",
            "expected_results": "Request rejected and the event logged",
            "related_threats": ["Spoofing"],
            "related_mitigations": ["Bind tokens to the client"],
            "priority": "High",
            "type": "Security"
        }],
        "coverage_summary": {
            "total_test_cases": 1,
            "threats_covered": 1,
            "total_threats": 1,
            "mitigations_verified": 1
        }
    })
    .to_string()
}

fn profile() -> ApplicationProfile {
    ApplicationProfile {
        app_type: "web application".to_string(),
        authentication: "OIDC".to_string(),
        internet_facing: "Yes".to_string(),
        sensitive_data: "PII".to_string(),
        app_input: "A storefront with checkout and invoicing.".to_string(),
        ..Default::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup_assessment(store: &ArtifactStore) -> String {
    init_tracing();
    let id = store.create_assessment().unwrap();
    store
        .save_details(&id, &json!({"threatModelingMethodology": "STRIDE"}))
        .unwrap();
    id
}

#[tokio::test]
async fn full_stage_chain_persists_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("storage")).unwrap();
    let id = setup_assessment(&store);

    let completer = ScriptedCompleter::new(&[
        &threat_model_response(),
        &attack_tree_response(),
        &dread_response(),
        &mitigation_response(),
    ]);
    let pipeline = AssessmentPipeline::new(&completer, &store);

    let report = pipeline.run_threat_model(&id, &profile()).await.unwrap();
    assert_eq!(report.threat_model[0].threat_type, "Spoofing");

    let tree = pipeline.run_attack_tree(&id).await.unwrap();
    assert_eq!(tree.total_paths, 1);

    let assessment = pipeline.run_dread(&id).await.unwrap();
    assert!((assessment.risk_assessment[0].risk_score() - 7.0).abs() < 1e-9);

    let mitigations = pipeline.run_mitigations(&id).await.unwrap();
    assert_eq!(mitigations["mitigations"][0]["Threat Type"], "Spoofing");

    for kind in [
        ArtifactKind::ThreatModel,
        ArtifactKind::AttackTree,
        ArtifactKind::DreadAssessment,
        ArtifactKind::Mitigation,
    ] {
        assert!(store.load(&id, kind).unwrap().is_some(), "missing {kind}");
    }

    // The attack tree artifact carries the rendered diagram.
    let tree_artifact = store.load(&id, ArtifactKind::AttackTree).unwrap().unwrap();
    let mermaid = tree_artifact.result["markdown"].as_str().unwrap();
    assert!(mermaid.starts_with("graph LR"));
    assert!(mermaid.contains("a1 -->|vulnerability| v1"));

    // Every stage recorded its prompt.
    let prompts = store.load(&id, ArtifactKind::Prompts).unwrap().unwrap();
    for stage in ["threat_model", "attack_tree", "dread_assessment", "mitigations"] {
        assert!(prompts.result.get(stage).is_some(), "no prompt for {stage}");
    }

    assert_eq!(completer.call_count(), 4);
}

#[tokio::test]
async fn downstream_stages_are_gated_on_the_threat_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("storage")).unwrap();
    let id = setup_assessment(&store);

    let completer = ScriptedCompleter::new(&[&attack_tree_response()]);
    let pipeline = AssessmentPipeline::new(&completer, &store);

    let err = pipeline.run_attack_tree(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingThreatModel(_)));
    let err = pipeline.run_dread(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingThreatModel(_)));
    let err = pipeline.run_mitigations(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingThreatModel(_)));
    let err = pipeline.run_test_cases(&id).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingThreatModel(_)));

    // Gating happens before any model call.
    assert_eq!(completer.call_count(), 0);
}

#[tokio::test]
async fn missing_methodology_blocks_the_first_stage() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("storage")).unwrap();
    let id = store.create_assessment().unwrap();

    let completer = ScriptedCompleter::new(&[&threat_model_response()]);
    let pipeline = AssessmentPipeline::new(&completer, &store);

    let err = pipeline.run_threat_model(&id, &profile()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));
    assert_eq!(completer.call_count(), 0);
}

#[tokio::test]
async fn dread_runs_without_an_attack_tree() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("storage")).unwrap();
    let id = setup_assessment(&store);

    let completer =
        ScriptedCompleter::new(&[&threat_model_response(), &dread_response()]);
    let pipeline = AssessmentPipeline::new(&completer, &store);

    pipeline.run_threat_model(&id, &profile()).await.unwrap();
    let assessment = pipeline.run_dread(&id).await.unwrap();

    assert_eq!(assessment.risk_assessment.len(), 1);
    assert!(store.load(&id, ArtifactKind::AttackTree).unwrap().is_none());
}

#[tokio::test]
async fn test_cases_consume_stored_mitigations() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("storage")).unwrap();
    let id = setup_assessment(&store);

    let completer = ScriptedCompleter::new(&[
        &threat_model_response(),
        &mitigation_response(),
        &test_cases_response(),
    ]);
    let pipeline = AssessmentPipeline::new(&completer, &store);

    pipeline.run_threat_model(&id, &profile()).await.unwrap();
    pipeline.run_mitigations(&id).await.unwrap();
    let suite = pipeline.run_test_cases(&id).await.unwrap();

    assert_eq!(suite["coverage_summary"]["mitigations_verified"], 1);

    let artifact = store.load(&id, ArtifactKind::TestCases).unwrap().unwrap();
    assert_eq!(artifact.result["test_cases"][0]["priority"], "High");

    let prompts = store.load(&id, ArtifactKind::Prompts).unwrap().unwrap();
    let recorded = prompts.result["test_cases"].as_str().unwrap();
    assert!(recorded.contains("Bind tokens to the client and shorten their lifetime"));

    assert_eq!(completer.call_count(), 3);
}

#[tokio::test]
async fn malformed_attack_tree_response_is_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("storage")).unwrap();
    let id = setup_assessment(&store);

    // Fenced, with a dropped comma between properties.
    let broken = "```json\n{\"nodes\": [{\"id\": \"root\"\n\"type\": \"goal\"\n\"label\": \"Compromise accounts\"}]}\n```";
    let completer = ScriptedCompleter::new(&[&threat_model_response(), broken]);
    let pipeline = AssessmentPipeline::new(&completer, &store);

    pipeline.run_threat_model(&id, &profile()).await.unwrap();
    let tree = pipeline.run_attack_tree(&id).await.unwrap();

    assert_eq!(tree.nodes[0].id, "root");
    assert_eq!(tree.nodes[0].label, "Compromise accounts");
    assert_eq!(tree.total_paths, 1);
}

fn write_roster(dir: &Path, names: &[&str]) -> PathBuf {
    let entries: Vec<serde_json::Value> =
        names.iter().map(|n| json!({"Name": n})).collect();
    let path = dir.join("microservices.json");
    std::fs::write(
        &path,
        serde_json::to_vec(&json!({"services": entries})).unwrap(),
    )
    .unwrap();
    path
}

#[tokio::test]
async fn rag_run_persists_report_and_additional_info() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("storage")).unwrap();
    let id = setup_assessment(&store);

    store
        .save(
            &id,
            ArtifactKind::AdditionalInfo,
            json!({"meetingTranscript": "notes"}),
        )
        .unwrap();

    let completer = ScriptedCompleter::new(&["Section body text."]);
    let embedder = HashEmbedder;
    let pipeline = AssessmentPipeline::new(&completer, &store);

    let sources: Vec<Box<dyn DocumentSource>> = vec![Box::new(TranscriptSource::new(
        "design-review",
        "The checkout service calls the payment gateway over HTTPS. \
         The auth service issues OIDC tokens to the storefront.",
    ))];
    let roster = write_roster(dir.path(), &["checkout", "auth"]);

    let report = pipeline
        .run_rag(
            &id,
            &embedder,
            &dir.path().join("index"),
            None,
            &sources,
            &roster,
        )
        .await
        .unwrap();

    assert!(report.combined.contains("# Microservice Summaries"));

    let rag_artifact = store.load(&id, ArtifactKind::RagResult).unwrap().unwrap();
    assert_eq!(rag_artifact.result.as_str().unwrap(), report.combined);

    // Reusable sections merged without clobbering prior fields.
    let info = store
        .load(&id, ArtifactKind::AdditionalInfo)
        .unwrap()
        .unwrap()
        .result;
    assert_eq!(info["meetingTranscript"], "notes");
    assert_eq!(info["functional_flows"], "Section body text.");
    assert_eq!(info["third_party_integrations"], "Section body text.");

    // Three sections plus two service summaries.
    assert_eq!(completer.call_count(), 5);
}
