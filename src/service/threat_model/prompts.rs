//! Threat model prompt templates

pub const THREAT_MODEL_SYSTEM_PROMPT: &str = r#"You are a security expert generating threat models in JSON format.
Your response MUST be a valid JSON object with exactly these fields:
1. "threat_model": An array of threat objects, each containing:
   - "Threat Type": The threat category from the selected methodology (e.g., "Spoofing", "Tampering")
   - "Scenario": A clear description of the threat
   - "Potential Impact": The consequences if exploited
2. "improvement_suggestions": An array of strings with mitigation recommendations

Example of valid response format:
{
  "threat_model": [
    {
      "Threat Type": "Information Disclosure",
      "Scenario": "Sensitive data exposure through unencrypted API responses",
      "Potential Impact": "Unauthorized access to user data leading to privacy violations"
    }
  ],
  "improvement_suggestions": [
    "Implement TLS encryption for all API communications",
    "Add response data encryption for sensitive fields"
  ]
}"#;

const EXAMPLE_RESPONSE: &str = r#"{
  "threat_model": [
    {
      "Threat Type": "Spoofing",
      "Scenario": "An attacker impersonates a legitimate user by replaying captured session tokens",
      "Potential Impact": "Account takeover and unauthorized actions on behalf of the victim"
    }
  ],
  "improvement_suggestions": [
    "Bind session tokens to client characteristics and rotate them frequently"
  ]
}"#;

/// Inputs describing the application under assessment.
#[derive(Debug, Clone)]
pub struct ThreatModelRequest {
    pub methodology: String,
    pub app_type: String,
    pub authentication: String,
    pub internet_facing: String,
    pub sensitive_data: String,
    pub app_input: String,
    pub custom_prompt: String,
    pub org_context: String,
}

/// Build the user prompt for threat model generation.
pub fn build_threat_model_prompt(request: &ThreatModelRequest) -> String {
    format!(
        r#"Act as a security architect with over 20 years of experience applying the {methodology} methodology. Analyze the application described below and produce a comprehensive threat model covering every component and data flow.

ORGANIZATION SECURITY CONTEXT:
{org_context}

Identify realistic threats specific to this application. Do not invent components that are not described. Cover each applicable {methodology} category at least once where the description supports it.

APPLICATION TYPE: {app_type}
AUTHENTICATION METHODS: {authentication}
INTERNET FACING: {internet_facing}
SENSITIVE DATA: {sensitive_data}
CODE SUMMARY, README CONTENT, AND APPLICATION DESCRIPTION:
{app_input}

ADDITIONAL CONTEXT AND REQUIREMENTS:
{custom_prompt}

Example of expected JSON response format:
{example}
"#,
        methodology = request.methodology,
        org_context = request.org_context,
        app_type = request.app_type,
        authentication = request.authentication,
        internet_facing = request.internet_facing,
        sensitive_data = request.sensitive_data,
        app_input = request.app_input,
        custom_prompt = request.custom_prompt,
        example = EXAMPLE_RESPONSE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_methodology_and_inputs() {
        let request = ThreatModelRequest {
            methodology: "PASTA".to_string(),
            app_type: "web application".to_string(),
            authentication: "OIDC".to_string(),
            internet_facing: "Yes".to_string(),
            sensitive_data: "payment card data".to_string(),
            app_input: "A storefront with a checkout flow.".to_string(),
            custom_prompt: String::new(),
            org_context: String::new(),
        };
        let prompt = build_threat_model_prompt(&request);
        assert!(prompt.contains("PASTA"));
        assert!(prompt.contains("APPLICATION TYPE: web application"));
        assert!(prompt.contains("checkout flow"));
    }
}
