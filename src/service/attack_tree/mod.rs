//! Attack tree generation stage
//!
//! Second stage of the assessment chain, built on the threat model. The
//! response handling degrades in steps: validate the parsed tree, then
//! salvage node fields out of broken text, then fall back to a minimal
//! default tree. Every path still yields a renderable diagram.

mod prompts;
mod render;
mod validation;

pub use render::to_mermaid;
pub use validation::{validate_tree, TreeValidationError};

use regex::Regex;

use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::model::{AttackTree, AttackTreeNode, NodeKind, ThreatModelReport};
use crate::service::repair::{parse_or_repair, RepairOutcome};

const MAX_TOKENS: u32 = 8000;

/// Outcome of the attack tree stage.
#[derive(Debug)]
pub struct AttackTreeOutput {
    pub tree: AttackTree,
    pub mermaid: String,
    pub prompt: String,
}

/// Generate an attack tree from the threat model.
pub async fn generate(
    provider: &dyn CompletionProvider,
    report: &ThreatModelReport,
    methodology: &str,
) -> AttackTreeOutput {
    tracing::info!(methodology, "Generating attack tree");

    let prompt = prompts::build_attack_tree_prompt(report, methodology);
    let messages = vec![
        ChatMessage::system(prompts::ATTACK_TREE_SYSTEM_PROMPT),
        ChatMessage::user(prompt.clone()),
    ];

    let tree = match provider
        .complete(CompletionRequest::new(messages, MAX_TOKENS).expecting_json())
        .await
    {
        Ok(response) => tree_from_response(&response),
        Err(e) => {
            tracing::error!(error = %e, "Attack tree completion failed");
            error_tree(&e.to_string())
        }
    };

    let mermaid = to_mermaid(&tree);
    AttackTreeOutput {
        tree,
        mermaid,
        prompt,
    }
}

fn tree_from_response(response: &str) -> AttackTree {
    match parse_or_repair(response) {
        RepairOutcome::Parsed(value) | RepairOutcome::Repaired(value) => {
            match validate_tree(&value) {
                Ok(tree) => tree,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid tree structure, attempting salvage");
                    salvage_tree(response).unwrap_or_else(fallback_tree)
                }
            }
        }
        RepairOutcome::Failed(cleaned) => {
            tracing::warn!("Unparseable tree response, attempting salvage");
            salvage_tree(&cleaned).unwrap_or_else(fallback_tree)
        }
    }
}

/// Reconstruct a minimal tree by extracting node fields from broken text.
///
/// One attack child is kept per distinct leading label word, hung off a
/// synthetic root goal.
fn salvage_tree(text: &str) -> Option<AttackTree> {
    let id_pattern = Regex::new(r#""id"\s*:\s*"([^"]+)""#).unwrap();
    let type_pattern = Regex::new(r#""type"\s*:\s*"([^"]+)""#).unwrap();
    let label_pattern = Regex::new(r#""label"\s*:\s*"([^"]+)""#).unwrap();

    if !id_pattern.is_match(text) || !type_pattern.is_match(text) {
        return None;
    }

    let kinds: Vec<&str> = type_pattern
        .captures_iter(text)
        .map(|c| c.get(1).unwrap().as_str())
        .collect();
    let labels: Vec<&str> = label_pattern
        .captures_iter(text)
        .map(|c| c.get(1).unwrap().as_str())
        .collect();
    if labels.is_empty() {
        return None;
    }

    let mut seen_types = std::collections::HashSet::new();
    let mut children = Vec::new();
    for (kind, label) in kinds.iter().zip(labels.iter()) {
        if *kind != "attack" {
            continue;
        }
        let head = label.split_whitespace().next().unwrap_or("Unknown");
        if seen_types.insert(head.to_string()) {
            children.push(AttackTreeNode::leaf(
                format!("attack{}", seen_types.len()),
                NodeKind::Attack,
                *label,
            ));
        }
    }

    tracing::warn!(
        salvaged = children.len(),
        "Constructed minimal tree from extracted properties"
    );

    let root = AttackTreeNode {
        id: "root".to_string(),
        kind: NodeKind::Goal,
        label: "Security Threats".to_string(),
        children,
    };
    let mut tree = AttackTree {
        nodes: vec![root],
        total_paths: 0,
    };
    tree.total_paths = tree.count_paths();
    Some(tree)
}

/// Last-resort default tree used when nothing can be recovered.
fn fallback_tree() -> AttackTree {
    AttackTree {
        nodes: vec![AttackTreeNode {
            id: "root".to_string(),
            kind: NodeKind::Goal,
            label: "Security Threats".to_string(),
            children: vec![AttackTreeNode {
                id: "attack1".to_string(),
                kind: NodeKind::Attack,
                label: "Spoofing Threats".to_string(),
                children: vec![AttackTreeNode::leaf(
                    "vuln1",
                    NodeKind::Vulnerability,
                    "Authentication vulnerabilities",
                )],
            }],
        }],
        total_paths: 1,
    }
}

fn error_tree(detail: &str) -> AttackTree {
    AttackTree {
        nodes: vec![AttackTreeNode::leaf(
            "error",
            NodeKind::Goal,
            format!("Error generating attack tree: {detail}"),
        )],
        total_paths: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::model::ThreatModelEntry;
    use async_trait::async_trait;

    struct ScriptedCompleter(String);

    #[async_trait]
    impl CompletionProvider for ScriptedCompleter {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn report() -> ThreatModelReport {
        ThreatModelReport {
            threat_model: vec![ThreatModelEntry::new(
                "Spoofing",
                "Replayed tokens",
                "Account takeover",
            )],
            improvement_suggestions: vec![],
        }
    }

    #[tokio::test]
    async fn valid_response_produces_tree_and_diagram() {
        let provider = ScriptedCompleter(
            r#"{"nodes": [{"id": "root", "type": "goal", "label": "Compromise", "children": [
                {"id": "a1", "type": "attack", "label": "Phish"}
            ]}]}"#
                .to_string(),
        );
        let output = generate(&provider, &report(), "STRIDE").await;
        assert_eq!(output.tree.total_paths, 1);
        assert!(output.mermaid.contains("root([\"Compromise\"])"));
        assert!(output.prompt.contains("Spoofing"));
    }

    #[tokio::test]
    async fn broken_json_is_salvaged_from_node_fields() {
        // Unbalanced braces defeat both repair passes but the fields survive.
        let provider = ScriptedCompleter(
            "{\"nodes\": [ {\"id\": \"n1\" \"type\": \"attack\" \"label\": \"Phishing campaign\" {{"
                .to_string(),
        );
        let output = generate(&provider, &report(), "STRIDE").await;
        assert_eq!(output.tree.nodes[0].label, "Security Threats");
        assert_eq!(output.tree.nodes[0].children.len(), 1);
        assert_eq!(output.tree.nodes[0].children[0].label, "Phishing campaign");
    }

    #[tokio::test]
    async fn hopeless_response_falls_back_to_default_tree() {
        let provider = ScriptedCompleter("no structure at all".to_string());
        let output = generate(&provider, &report(), "STRIDE").await;
        assert_eq!(output.tree.nodes[0].children[0].label, "Spoofing Threats");
        assert_eq!(output.tree.total_paths, 1);
    }

    #[test]
    fn salvage_dedupes_attack_labels_by_leading_word() {
        let text = r#""id": "a" "type": "attack" "label": "Spoofing login"
                      "id": "b" "type": "attack" "label": "Spoofing session"
                      "id": "c" "type": "attack" "label": "Tampering data""#;
        let tree = salvage_tree(text).unwrap();
        let labels: Vec<&str> = tree.nodes[0]
            .children
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Spoofing login", "Tampering data"]);
    }
}
