//! Threat model report types

use serde::{Deserialize, Serialize};

/// A single identified threat.
///
/// The serialized keys are the canonical report keys; normalization in
/// `service::threat_model` guarantees all three are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatModelEntry {
    #[serde(rename = "Threat Type")]
    pub threat_type: String,
    #[serde(rename = "Scenario")]
    pub scenario: String,
    #[serde(rename = "Potential Impact")]
    pub potential_impact: String,
}

impl ThreatModelEntry {
    pub fn new(
        threat_type: impl Into<String>,
        scenario: impl Into<String>,
        potential_impact: impl Into<String>,
    ) -> Self {
        Self {
            threat_type: threat_type.into(),
            scenario: scenario.into(),
            potential_impact: potential_impact.into(),
        }
    }
}

/// Normalized threat model output: always at least one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatModelReport {
    pub threat_model: Vec<ThreatModelEntry>,
    pub improvement_suggestions: Vec<String>,
}

impl ThreatModelReport {
    /// Render the report as a markdown table plus suggestion list.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("\n\n");
        out.push_str("| Threat Type | Scenario | Potential Impact |\n");
        out.push_str("|-------------|----------|------------------|\n");
        for threat in &self.threat_model {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                threat.threat_type, threat.scenario, threat.potential_impact
            ));
        }
        out.push_str("\n\n## Improvement Suggestions\n\n");
        for suggestion in &self.improvement_suggestions {
            out.push_str(&format!("- {suggestion}\n"));
        }
        out
    }
}
