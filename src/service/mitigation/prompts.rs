//! Mitigation prompt templates

use crate::model::{AttackTree, DreadAssessment, ThreatModelReport};

pub const MITIGATION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that provides threat mitigation strategies in JSON format.";

const EXAMPLE_RESPONSE: &str = r#"{
  "mitigations": [
    {
      "Threat Type": "Spoofing",
      "Scenario": "An attacker replays captured session tokens",
      "Suggested Mitigation(s)": "Bind tokens to client characteristics, shorten token lifetime and rotate on privilege change"
    }
  ]
}"#;

/// Build the user prompt for mitigation generation.
///
/// Attack tree and DREAD context are optional and omitted when absent.
pub fn build_mitigations_prompt(
    report: &ThreatModelReport,
    attack_tree: Option<&AttackTree>,
    dread: Option<&DreadAssessment>,
) -> String {
    let formatted_threats = report
        .threat_model
        .iter()
        .map(|t| {
            format!(
                "Threat Type: {}\nScenario: {}\nPotential Impact: {}",
                t.threat_type, t.scenario, t.potential_impact
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let attack_tree_context = attack_tree
        .and_then(|tree| serde_json::to_string_pretty(tree).ok())
        .map(|json| format!("\n\nAttack Tree Analysis:\n{json}"))
        .unwrap_or_default();

    let dread_context = dread
        .and_then(|assessment| serde_json::to_string_pretty(assessment).ok())
        .map(|json| format!("\n\nDREAD Risk Assessment:\n{json}"))
        .unwrap_or_default();

    format!(
        r#"You are a security engineer recommending concrete mitigations. For every identified threat propose specific, actionable countermeasures, prioritized by the available risk data.

Respond with a JSON object holding a "mitigations" array, one entry per threat, each carrying "Threat Type", "Scenario" and "Suggested Mitigation(s)".

Example of expected JSON response format:
{EXAMPLE_RESPONSE}

Below is the list of identified threats:
{formatted_threats}
{attack_tree_context}
{dread_context}

YOUR RESPONSE (do not wrap in a code block):
"#
    )
}
