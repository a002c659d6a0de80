//! Test case prompt templates

use serde_json::Value;

use crate::model::ThreatModelReport;

pub const TEST_CASES_SYSTEM_PROMPT: &str =
    "You are a helpful assistant designed to output JSON.";

/// Build the user prompt for test case generation.
///
/// Mitigation context is optional; an empty object stands in when that
/// stage has not run.
pub fn build_test_cases_prompt(report: &ThreatModelReport, mitigations: Option<&Value>) -> String {
    let threat_json = serde_json::to_string_pretty(report).unwrap_or_default();
    let mitigation_json = mitigations
        .and_then(|m| serde_json::to_string_pretty(m).ok())
        .unwrap_or_else(|| "{}".to_string());

    format!(
        r#"Generate security test cases for the following threat model and mitigations:

Threat Model:
{threat_json}

Mitigations:
{mitigation_json}

For each test case, provide:
1. A title
2. A description
3. Test steps
4. Expected results
5. Related threats
6. Related mitigations
7. Priority (High, Medium, Low)
8. Type (Functional, Security, Performance)

Also provide a coverage summary with:
1. Total number of test cases
2. Number of threats covered
3. Total number of threats
4. Number of mitigations verified

Format the response as a JSON object with 'test_cases' and 'coverage_summary' keys.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThreatModelEntry;
    use serde_json::json;

    fn report() -> ThreatModelReport {
        ThreatModelReport {
            threat_model: vec![ThreatModelEntry::new("Spoofing", "s", "i")],
            improvement_suggestions: vec![],
        }
    }

    #[test]
    fn prompt_embeds_threats_and_defaults_mitigations() {
        let prompt = build_test_cases_prompt(&report(), None);
        assert!(prompt.contains("\"Threat Type\": \"Spoofing\""));
        assert!(prompt.contains("Mitigations:\n{}"));
        assert!(prompt.contains("'test_cases' and 'coverage_summary'"));
    }

    #[test]
    fn mitigation_context_is_embedded_when_present() {
        let mitigations = json!({"mitigations": [{"Suggested Mitigation(s)": "Rotate tokens"}]});
        let prompt = build_test_cases_prompt(&report(), Some(&mitigations));
        assert!(prompt.contains("Rotate tokens"));
        assert!(!prompt.contains("Mitigations:\n{}"));
    }
}
