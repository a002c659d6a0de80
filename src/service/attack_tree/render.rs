//! Mermaid rendering for attack trees
//!
//! Rendering is a pure fold over the tree: one pass collects node and
//! edge declarations in traversal order, then link styles are emitted
//! with one `linkStyle` per edge, indexed in that same order.

use crate::model::{AttackTree, AttackTreeNode, NodeKind};

const HEADER: &[&str] = &[
    "graph LR",
    "    %% Configuration for better spacing and layout",
    "    graph [rankdir=LR nodesep=100 ranksep=150]",
    "    %% Node styling",
    "    classDef goal fill:#ffd7d7 stroke:#ff9999 color:#cc0000 stroke-width:2px padding:15px margin:10px",
    "    classDef attack fill:#fff3d7 stroke:#ffd699 color:#cc7700 stroke-width:2px padding:10px margin:10px",
    "    classDef vulnerability fill:#d7e9ff stroke:#99c2ff color:#0052cc stroke-width:2px padding:8px margin:10px",
];

struct Declarations {
    nodes: Vec<String>,
    edges: Vec<(String, NodeKind, String)>,
}

/// Render the tree as a left-to-right Mermaid graph.
pub fn to_mermaid(tree: &AttackTree) -> String {
    let mut decls = Declarations {
        nodes: Vec::new(),
        edges: Vec::new(),
    };
    for root in &tree.nodes {
        collect(root, None, &mut decls);
    }

    let mut lines: Vec<String> = HEADER.iter().map(|l| (*l).to_string()).collect();
    lines.extend(decls.nodes);
    for (parent, kind, child) in &decls.edges {
        lines.push(format!("    {parent} -->|{kind}| {child}"));
    }
    for index in 0..decls.edges.len() {
        lines.push(format!(
            "    linkStyle {index} stroke:#333333 stroke-width:2px fill:none"
        ));
    }
    lines.join("\n")
}

fn collect(node: &AttackTreeNode, parent: Option<&str>, decls: &mut Declarations) {
    let declaration = match node.kind {
        NodeKind::Goal => format!("    {}([\"{}\"])", node.id, node.label),
        NodeKind::Attack => format!("    {}{{{{{}}}}}", node.id, node.label),
        NodeKind::Vulnerability => format!("    {}[\"{}\"]", node.id, node.label),
    };
    decls.nodes.push(declaration);
    decls.nodes.push(format!("    class {} {}", node.id, node.kind));

    if let Some(parent_id) = parent {
        decls
            .edges
            .push((parent_id.to_string(), node.kind, node.id.clone()));
    }

    for child in &node.children {
        collect(child, Some(&node.id), decls);
    }
}
