//! DREAD risk assessment types

use serde::{Deserialize, Serialize};

/// One DREAD-scored threat. The five numeric fields range over 0–10.
///
/// The Risk Score is deliberately not a field: it is derived at read time
/// via [`DreadEntry::risk_score`], never stored by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreadEntry {
    #[serde(rename = "Threat Type")]
    pub threat_type: String,
    #[serde(rename = "Scenario")]
    pub scenario: String,
    #[serde(rename = "Damage Potential", default)]
    pub damage_potential: f64,
    #[serde(rename = "Reproducibility", default)]
    pub reproducibility: f64,
    #[serde(rename = "Exploitability", default)]
    pub exploitability: f64,
    #[serde(rename = "Affected Users", default)]
    pub affected_users: f64,
    #[serde(rename = "Discoverability", default)]
    pub discoverability: f64,
}

impl DreadEntry {
    /// Arithmetic mean of the five DREAD dimensions.
    ///
    /// For inputs in [0, 10] the score is in [0, 10].
    pub fn risk_score(&self) -> f64 {
        (self.damage_potential
            + self.reproducibility
            + self.exploitability
            + self.affected_users
            + self.discoverability)
            / 5.0
    }
}

/// DREAD assessment payload under the canonical `"Risk Assessment"` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreadAssessment {
    #[serde(rename = "Risk Assessment", default)]
    pub risk_assessment: Vec<DreadEntry>,
}

impl DreadAssessment {
    /// Render the assessment as a markdown table, computing each entry's
    /// risk score on the fly.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("\n\n## DREAD Risk Assessment\n\n");
        out.push_str("| Threat Type | Scenario | Damage Potential | Reproducibility | Exploitability | Affected Users | Discoverability | Risk Score |\n");
        out.push_str("|-------------|----------|------------------|-----------------|----------------|----------------|-----------------|-------------|\n");
        for entry in &self.risk_assessment {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {:.2} |\n",
                entry.threat_type,
                entry.scenario,
                entry.damage_potential,
                entry.reproducibility,
                entry.exploitability,
                entry.affected_users,
                entry.discoverability,
                entry.risk_score()
            ));
        }
        out
    }
}
