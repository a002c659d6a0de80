//! DREAD scoring stage
//!
//! Third stage of the assessment chain. Requires the threat model; the
//! attack tree is optional context. Entries that fail to deserialize are
//! dropped individually instead of failing the whole assessment, and a
//! completely unusable response degrades to a zero-scored placeholder.

mod prompts;

use serde_json::Value;

use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::model::{AttackTree, DreadAssessment, DreadEntry, ThreatModelReport};
use crate::service::repair::{parse_or_repair, RepairOutcome};

const MAX_TOKENS: u32 = 8000;

/// Outcome of the DREAD stage.
#[derive(Debug)]
pub struct DreadOutput {
    pub assessment: DreadAssessment,
    pub markdown: String,
    pub prompt: String,
}

/// Score the threat model with the DREAD method.
pub async fn generate(
    provider: &dyn CompletionProvider,
    report: &ThreatModelReport,
    attack_tree: Option<&AttackTree>,
) -> DreadOutput {
    tracing::info!(
        threats = report.threat_model.len(),
        with_attack_tree = attack_tree.is_some(),
        "Generating DREAD assessment"
    );

    let prompt = prompts::build_dread_prompt(report, attack_tree);
    let messages = vec![
        ChatMessage::system(prompts::DREAD_SYSTEM_PROMPT),
        ChatMessage::user(prompt.clone()),
    ];

    let assessment = match provider
        .complete(CompletionRequest::new(messages, MAX_TOKENS).expecting_json())
        .await
    {
        Ok(response) => match parse_or_repair(&response) {
            RepairOutcome::Parsed(value) | RepairOutcome::Repaired(value) => normalize(&value),
            RepairOutcome::Failed(_) => {
                error_assessment("response was not valid JSON after repair")
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "DREAD completion failed");
            error_assessment(&e.to_string())
        }
    };

    let markdown = assessment.to_markdown();
    DreadOutput {
        assessment,
        markdown,
        prompt,
    }
}

/// Normalize a parsed response into the canonical assessment shape.
///
/// A missing `"Risk Assessment"` key becomes an empty assessment; invalid
/// entries are skipped with a warning.
pub fn normalize(value: &Value) -> DreadAssessment {
    let entries = match value.get("Risk Assessment") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => {
            tracing::warn!("Response missing 'Risk Assessment' field");
            Vec::new()
        }
        Some(other) => vec![other.clone()],
    };

    let mut risk_assessment = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<DreadEntry>(entry) {
            Ok(parsed) => risk_assessment.push(parsed),
            Err(e) => tracing::warn!(error = %e, "Skipping invalid DREAD entry"),
        }
    }

    DreadAssessment { risk_assessment }
}

fn error_assessment(detail: &str) -> DreadAssessment {
    DreadAssessment {
        risk_assessment: vec![DreadEntry {
            threat_type: "Error".to_string(),
            scenario: format!("Failed to generate DREAD assessment: {detail}"),
            damage_potential: 0.0,
            reproducibility: 0.0,
            exploitability: 0.0,
            affected_users: 0.0,
            discoverability: 0.0,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::model::ThreatModelEntry;
    use async_trait::async_trait;
    use serde_json::json;

    struct ScriptedCompleter(String);

    #[async_trait]
    impl CompletionProvider for ScriptedCompleter {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn report() -> ThreatModelReport {
        ThreatModelReport {
            threat_model: vec![ThreatModelEntry::new("Spoofing", "s", "i")],
            improvement_suggestions: vec![],
        }
    }

    #[test]
    fn normalize_keeps_valid_entries_and_skips_broken_ones() {
        let assessment = normalize(&json!({
            "Risk Assessment": [
                {
                    "Threat Type": "Spoofing",
                    "Scenario": "Token replay",
                    "Damage Potential": 8,
                    "Reproducibility": 6,
                    "Exploitability": 5,
                    "Affected Users": 9,
                    "Discoverability": 4
                },
                {"bogus": true}
            ]
        }));
        assert_eq!(assessment.risk_assessment.len(), 1);
        assert!((assessment.risk_assessment[0].risk_score() - 6.4).abs() < 1e-9);
    }

    #[test]
    fn missing_key_becomes_empty_assessment() {
        let assessment = normalize(&json!({"something_else": []}));
        assert!(assessment.risk_assessment.is_empty());
    }

    #[test]
    fn missing_scores_default_to_zero() {
        let assessment = normalize(&json!({
            "Risk Assessment": [{
                "Threat Type": "Tampering",
                "Scenario": "Payload modification"
            }]
        }));
        assert_eq!(assessment.risk_assessment[0].risk_score(), 0.0);
    }

    #[tokio::test]
    async fn generation_without_attack_tree_succeeds() {
        let provider = ScriptedCompleter(
            json!({
                "Risk Assessment": [{
                    "Threat Type": "Spoofing",
                    "Scenario": "s",
                    "Damage Potential": 5,
                    "Reproducibility": 5,
                    "Exploitability": 5,
                    "Affected Users": 5,
                    "Discoverability": 5
                }]
            })
            .to_string(),
        );
        let output = generate(&provider, &report(), None).await;
        assert_eq!(output.assessment.risk_assessment.len(), 1);
        assert!(!output.prompt.contains("Attack Tree Analysis"));
        assert!(output.markdown.contains("| Spoofing |"));
    }

    #[tokio::test]
    async fn unusable_response_yields_zero_scored_error_entry() {
        let provider = ScriptedCompleter("not json at all".to_string());
        let output = generate(&provider, &report(), None).await;
        let entry = &output.assessment.risk_assessment[0];
        assert_eq!(entry.threat_type, "Error");
        assert_eq!(entry.risk_score(), 0.0);
    }
}
