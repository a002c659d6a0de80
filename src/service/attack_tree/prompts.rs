//! Attack tree prompt templates

use std::collections::BTreeMap;

use crate::model::ThreatModelReport;

pub const ATTACK_TREE_SYSTEM_PROMPT: &str = r#"You are a Security Architect and expert. Create an attack tree structure in JSON format.
IMPORTANT: Your response must be ONLY valid JSON, with no additional text or explanation.
Ensure all JSON strings are properly escaped and the structure is valid.
Always use commas between properties and array elements."#;

const EXAMPLE_TREE: &str = r#"{
  "nodes": [
    {
      "id": "root",
      "type": "goal",
      "label": "Compromise the application",
      "children": [
        {
          "id": "attack1",
          "type": "attack",
          "label": "Steal user credentials",
          "children": [
            {
              "id": "vuln1",
              "type": "vulnerability",
              "label": "Phishing-susceptible login flow"
            }
          ]
        }
      ]
    }
  ],
  "total_paths": 1
}"#;

/// Build the user prompt from the threat model, grouping threats by type.
pub fn build_attack_tree_prompt(report: &ThreatModelReport, methodology: &str) -> String {
    let mut by_type: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for threat in &report.threat_model {
        by_type
            .entry(threat.threat_type.as_str())
            .or_default()
            .push(format!(
                "- Scenario: {}\n  Impact: {}",
                threat.scenario, threat.potential_impact
            ));
    }

    let mut formatted = Vec::with_capacity(by_type.len());
    for (threat_type, entries) in by_type {
        formatted.push(format!("## {threat_type} Threats:\n{}", entries.join("\n")));
    }
    let formatted_threats = formatted.join("\n\n");

    format!(
        r#"Using the threats identified through the {methodology} methodology, construct an attack tree showing how an attacker could realize them. Every node needs a unique "id", a "type" of "goal", "attack" or "vulnerability", and a "label". Exactly one root goal node is expected; node ids must never repeat.

The JSON structure should follow this format:
{EXAMPLE_TREE}

Below are the identified threats to consider:
{formatted_threats}

IMPORTANT: Your response must be ONLY valid JSON, with no additional text or explanation.
Ensure all JSON strings are properly escaped and the structure is valid.
Use commas between all properties and array elements.
"#
    )
}
