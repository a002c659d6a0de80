//! Structural validation for parsed attack trees
//!
//! A usable tree has a non-empty `nodes` array in which every node carries
//! an id, a known type and a label, and no id appears twice. Unique ids
//! make the structure a strict tree, which the path count relies on.

use std::collections::HashSet;

use serde_json::Value;

use crate::model::AttackTree;

#[derive(Debug, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree is missing a 'nodes' array")]
    MissingNodes,

    #[error("tree has an empty 'nodes' array")]
    EmptyNodes,

    #[error("node is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("node '{id}' has invalid type '{kind}'")]
    InvalidKind { id: String, kind: String },

    #[error("duplicate node id '{0}'")]
    DuplicateId(String),
}

const VALID_KINDS: &[&str] = &["goal", "attack", "vulnerability"];

/// Validate a parsed response and convert it into a typed tree.
///
/// When `total_paths` is absent or zero it is derived from the structure.
pub fn validate_tree(value: &Value) -> Result<AttackTree, TreeValidationError> {
    let nodes = value
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or(TreeValidationError::MissingNodes)?;
    if nodes.is_empty() {
        return Err(TreeValidationError::EmptyNodes);
    }

    let mut seen = HashSet::new();
    for node in nodes {
        validate_node(node, &mut seen)?;
    }

    let mut tree: AttackTree = serde_json::from_value(value.clone())
        .map_err(|_| TreeValidationError::MissingNodes)?;
    if tree.total_paths == 0 {
        tree.total_paths = tree.count_paths();
    }
    Ok(tree)
}

fn validate_node(
    node: &Value,
    seen: &mut HashSet<String>,
) -> Result<(), TreeValidationError> {
    let id = node
        .get("id")
        .and_then(Value::as_str)
        .ok_or(TreeValidationError::MissingField("id"))?;
    let kind = node
        .get("type")
        .and_then(Value::as_str)
        .ok_or(TreeValidationError::MissingField("type"))?;
    node.get("label")
        .and_then(Value::as_str)
        .ok_or(TreeValidationError::MissingField("label"))?;

    if !VALID_KINDS.contains(&kind) {
        return Err(TreeValidationError::InvalidKind {
            id: id.to_string(),
            kind: kind.to_string(),
        });
    }
    if !seen.insert(id.to_string()) {
        return Err(TreeValidationError::DuplicateId(id.to_string()));
    }

    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children {
            validate_node(child, seen)?;
        }
    }
    Ok(())
}
