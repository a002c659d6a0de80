//! Mitigation recommendation stage
//!
//! Final stage of the assessment chain. Consumes the threat model and
//! whatever attack tree and DREAD context exist. Mitigation entries stay
//! schemaless: the canonical shape is a `"mitigations"` array, but when a
//! response uses a different top-level key the first list-valued key is
//! adopted instead.

mod prompts;

use serde_json::Value;

use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::model::{AttackTree, DreadAssessment, ThreatModelReport};
use crate::service::repair::{parse_or_repair, RepairOutcome};

const MAX_TOKENS: u32 = 8000;

/// Outcome of the mitigation stage.
#[derive(Debug)]
pub struct MitigationOutput {
    pub mitigations: Vec<Value>,
    pub prompt: String,
}

impl MitigationOutput {
    /// The artifact payload shape.
    pub fn payload(&self) -> Value {
        serde_json::json!({ "mitigations": self.mitigations })
    }
}

/// Generate mitigations for the identified threats.
pub async fn generate(
    provider: &dyn CompletionProvider,
    report: &ThreatModelReport,
    attack_tree: Option<&AttackTree>,
    dread: Option<&DreadAssessment>,
) -> MitigationOutput {
    tracing::info!(
        threats = report.threat_model.len(),
        with_attack_tree = attack_tree.is_some(),
        with_dread = dread.is_some(),
        "Generating mitigations"
    );

    let prompt = prompts::build_mitigations_prompt(report, attack_tree, dread);
    let messages = vec![
        ChatMessage::system(prompts::MITIGATION_SYSTEM_PROMPT),
        ChatMessage::user(prompt.clone()),
    ];

    let mitigations = match provider
        .complete(CompletionRequest::new(messages, MAX_TOKENS).expecting_json())
        .await
    {
        Ok(response) => match parse_or_repair(&response) {
            RepairOutcome::Parsed(value) | RepairOutcome::Repaired(value) => normalize(&value),
            RepairOutcome::Failed(_) => fallback_mitigations("Failed to parse mitigations JSON"),
        },
        Err(e) => {
            tracing::error!(error = %e, "Mitigation completion failed");
            fallback_mitigations("Failed to generate mitigations")
        }
    };

    MitigationOutput {
        mitigations,
        prompt,
    }
}

/// Extract the mitigation list from a parsed response.
///
/// Prefers the canonical `"mitigations"` key; otherwise adopts the first
/// non-empty list-valued key. Anything else yields an empty list.
pub fn normalize(value: &Value) -> Vec<Value> {
    if let Some(Value::Array(items)) = value.get("mitigations") {
        return items.clone();
    }

    if let Some(obj) = value.as_object() {
        for (key, candidate) in obj {
            if let Value::Array(items) = candidate {
                if !items.is_empty() {
                    tracing::info!(key = %key, "Adopting list-valued key as mitigations");
                    return items.clone();
                }
            }
        }
    }

    tracing::warn!("Response contained no mitigation list");
    Vec::new()
}

fn fallback_mitigations(detail: &str) -> Vec<Value> {
    vec![serde_json::json!({
        "Threat Type": "Error",
        "Scenario": detail,
        "Suggested Mitigation(s)": "Please try again"
    })]
}
