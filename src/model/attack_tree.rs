//! Attack tree structure produced by the attack-tree stage

use serde::{Deserialize, Serialize};

/// Node role within the tree. Exactly one `Goal` root is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Goal,
    Attack,
    Vulnerability,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Goal => f.write_str("goal"),
            NodeKind::Attack => f.write_str("attack"),
            NodeKind::Vulnerability => f.write_str("vulnerability"),
        }
    }
}

/// A node in the attack tree. `id` must be unique within the whole tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackTreeNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AttackTreeNode>,
}

impl AttackTreeNode {
    pub fn leaf(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Number of root-to-leaf paths below (and including) this node.
    pub fn path_count(&self) -> usize {
        if self.children.is_empty() {
            return 1;
        }
        self.children.iter().map(AttackTreeNode::path_count).sum()
    }
}

/// Validated attack tree with its derived path count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackTree {
    pub nodes: Vec<AttackTreeNode>,
    #[serde(default)]
    pub total_paths: usize,
}

impl AttackTree {
    /// Sum of root-to-leaf paths across all roots. Valid only for strict
    /// trees; duplicate-id validation rejects shared subtrees upstream.
    pub fn count_paths(&self) -> usize {
        self.nodes.iter().map(AttackTreeNode::path_count).sum()
    }
}
