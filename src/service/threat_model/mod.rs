//! Threat model generation stage
//!
//! First stage of the assessment chain. Produces a normalized threat
//! model from the application description; downstream stages consume its
//! output. Generation degrades rather than fails: an unusable model
//! response yields a placeholder entry that keeps the chain alive.

mod prompts;

pub use prompts::ThreatModelRequest;

use serde_json::Value;

use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::model::{ThreatModelEntry, ThreatModelReport};
use crate::service::repair::{parse_or_repair, RepairOutcome};

const MAX_TOKENS: u32 = 8000;

/// Outcome of the threat model stage.
#[derive(Debug)]
pub struct ThreatModelOutput {
    pub report: ThreatModelReport,
    pub markdown: String,
    /// The exact prompt sent, kept for the audit record.
    pub prompt: String,
}

/// Generate a threat model for the described application.
pub async fn generate(
    provider: &dyn CompletionProvider,
    request: &ThreatModelRequest,
) -> ThreatModelOutput {
    tracing::info!(methodology = %request.methodology, "Generating threat model");

    let prompt = prompts::build_threat_model_prompt(request);
    let messages = vec![
        ChatMessage::system(prompts::THREAT_MODEL_SYSTEM_PROMPT),
        ChatMessage::user(prompt.clone()),
    ];

    let report = match provider
        .complete(CompletionRequest::new(messages, MAX_TOKENS).expecting_json())
        .await
    {
        Ok(response) => match parse_or_repair(&response) {
            RepairOutcome::Parsed(value) | RepairOutcome::Repaired(value) => normalize(&value),
            RepairOutcome::Failed(_) => {
                error_report("response was not valid JSON after repair")
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Threat model completion failed");
            error_report(&e.to_string())
        }
    };

    let markdown = report.to_markdown();
    ThreatModelOutput {
        report,
        markdown,
        prompt,
    }
}

/// Normalize a parsed response into the canonical report shape.
///
/// Tolerates singleton objects where arrays are expected and alias field
/// names; a canonical key always wins over its aliases.
pub fn normalize(value: &Value) -> ThreatModelReport {
    let threats = as_array(value.get("threat_model"));

    let mut entries = Vec::new();
    for threat in &threats {
        let Some(obj) = threat.as_object() else {
            tracing::warn!("Skipping non-object threat entry");
            continue;
        };

        let threat_type = field(obj, &["Threat Type", "type", "threat_type"], "Unknown");
        let scenario = field(
            obj,
            &["Scenario", "description", "scenario"],
            "No scenario provided",
        );
        let impact = field(
            obj,
            &["Potential Impact", "impact", "potential_impact"],
            "Impact not specified",
        );
        entries.push(ThreatModelEntry::new(threat_type, scenario, impact));
    }

    if entries.is_empty() {
        tracing::warn!("No valid threats found in response");
        entries.push(ThreatModelEntry::new(
            "Warning",
            "No valid threats were identified in the model generation response",
            "Incomplete security assessment",
        ));
    }

    let suggestions = as_array(value.get("improvement_suggestions"))
        .iter()
        .filter_map(|s| match s {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Null => None,
            Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .collect();

    ThreatModelReport {
        threat_model: entries,
        improvement_suggestions: suggestions,
    }
}

/// Coerce a value into an array: arrays pass through, null and absent
/// become empty, anything else becomes a singleton.
fn as_array(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}

fn field(
    obj: &serde_json::Map<String, Value>,
    keys: &[&str],
    default: &str,
) -> String {
    for key in keys {
        if let Some(Value::String(text)) = obj.get(*key) {
            if !text.trim().is_empty() {
                return text.clone();
            }
        }
    }
    default.to_string()
}

fn error_report(detail: &str) -> ThreatModelReport {
    ThreatModelReport {
        threat_model: vec![ThreatModelEntry::new(
            "Error",
            format!("Failed to generate threat model: {detail}"),
            "Unable to assess security threats",
        )],
        improvement_suggestions: vec![
            "Try again with a more detailed application description".to_string(),
            "Check API key and connection".to_string(),
        ],
    }
}
