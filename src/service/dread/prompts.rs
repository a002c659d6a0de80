//! DREAD assessment prompt templates

use crate::model::{AttackTree, ThreatModelReport};

pub const DREAD_SYSTEM_PROMPT: &str =
    "You are a helpful assistant designed to output JSON.";

const EXAMPLE_RESPONSE: &str = r#"{
  "Risk Assessment": [
    {
      "Threat Type": "Spoofing",
      "Scenario": "An attacker replays captured session tokens",
      "Damage Potential": 8,
      "Reproducibility": 6,
      "Exploitability": 5,
      "Affected Users": 9,
      "Discoverability": 4
    }
  ]
}"#;

/// Build the user prompt for DREAD scoring.
///
/// The attack tree is optional context; when absent the prompt simply
/// omits that block.
pub fn build_dread_prompt(
    report: &ThreatModelReport,
    attack_tree: Option<&AttackTree>,
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

    format!(
        r#"You are an experienced risk analyst. Score each identified threat with the DREAD model. For every threat rate Damage Potential, Reproducibility, Exploitability, Affected Users and Discoverability on a 0-10 scale, justified by the scenario described.

Below is the list of identified threats:

{formatted_threats}
{attack_tree_context}

Respond with a JSON object holding a "Risk Assessment" array, one entry per threat, each carrying "Threat Type", "Scenario" and the five numeric DREAD dimensions.

Example of expected JSON response format:
{EXAMPLE_RESPONSE}

Ensure the JSON response is correctly formatted and does not contain any additional text.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttackTreeNode, NodeKind, ThreatModelEntry};

    fn report() -> ThreatModelReport {
        ThreatModelReport {
            threat_model: vec![ThreatModelEntry::new("Spoofing", "s", "i")],
            improvement_suggestions: vec![],
        }
    }

    #[test]
    fn prompt_without_tree_omits_tree_block() {
        let prompt = build_dread_prompt(&report(), None);
        assert!(prompt.contains("Threat Type: Spoofing"));
        assert!(!prompt.contains("Attack Tree Analysis"));
    }

    #[test]
    fn prompt_with_tree_embeds_tree_json() {
        let tree = AttackTree {
            nodes: vec![AttackTreeNode::leaf("root", NodeKind::Goal, "Goal")],
            total_paths: 1,
        };
        let prompt = build_dread_prompt(&report(), Some(&tree));
        assert!(prompt.contains("Attack Tree Analysis"));
        assert!(prompt.contains("\"root\""));
    }
}
