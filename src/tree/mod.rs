//! # Tree Module
//!
//! Build-time trie over route templates. [`DfaTreeBuilder`] constructs a
//! [`DfaTree`] of [`DfaNode`]s breadth-first across path depth, merging
//! endpoints that share literal/parameter/catch-all structure and letting
//! node-builder policies branch terminal nodes; lowering then flattens the
//! tree into the immutable state array the request-time engine walks.
//!
//! Nodes live in an arena and reference each other by index, so the
//! catch-all self-loop (a node whose parameter and catch-all transitions
//! point at itself) is just a repeated [`NodeId`] rather than a reference
//! cycle. Traversals still carry a visited check; the loop is real.

mod builder;
mod lower;

pub use builder::DfaTreeBuilder;
pub use lower::DfaState;
pub(crate) use lower::lower;

use crate::endpoint::Endpoint;
use crate::jump_table::literal_matches;
use crate::policy::{MatcherPolicy, PolicyEdgeKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Index of a node within its [`DfaTree`] arena.
pub type NodeId = usize;

/// A literal edge out of a tree node.
#[derive(Debug, Clone)]
pub struct LiteralEdge {
    /// Literal text in original case (compared case-insensitively)
    pub text: String,
    /// Child node
    pub node: NodeId,
}

/// One node of the build-time tree. Discarded after lowering.
#[derive(Debug, Default)]
pub struct DfaNode {
    /// Path depth of this node (segments consumed to reach it)
    pub path_depth: usize,
    /// Optional debug label (`/a/{…}/b`), built when configured
    pub label: Option<String>,
    /// Endpoints terminal at this node, in work-list order
    pub matches: Vec<Arc<Endpoint>>,
    /// Literal children, keyed by case-folded text
    pub literals: HashMap<String, LiteralEdge>,
    /// Shared child for parameter and complex-segment continuations
    pub parameters: Option<NodeId>,
    /// Catch-all child; self-looping (its own parameters and catch-all
    /// point back at itself)
    pub catch_all: Option<NodeId>,
    /// Policy edges added by `node_builder`, in edge order
    pub policy_edges: Vec<(PolicyEdgeKey, NodeId)>,
    /// The node-builder policy that owns this node's policy edges
    pub node_builder: Option<Arc<dyn MatcherPolicy>>,
}

impl DfaNode {
    /// Append a terminal match, skipping duplicates.
    pub(crate) fn add_match(&mut self, endpoint: &Arc<Endpoint>) {
        if !self.matches.iter().any(|e| Arc::ptr_eq(e, endpoint)) {
            self.matches.push(Arc::clone(endpoint));
        }
    }

    /// Look up a literal child, case-insensitively.
    #[must_use]
    pub fn literal(&self, text: &str) -> Option<NodeId> {
        let folded = fold_literal(text);
        if let Some(edge) = self.literals.get(&folded) {
            return Some(edge.node);
        }
        // Case folding of non-ASCII text is not always reversible through
        // the key; fall back to a scan.
        self.literals
            .values()
            .find(|edge| literal_matches(&edge.text, text))
            .map(|edge| edge.node)
    }

    /// Policy edge child for `key`, if present.
    #[must_use]
    pub fn policy_edge(&self, key: &PolicyEdgeKey) -> Option<NodeId> {
        self.policy_edges
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| *node)
    }
}

/// Case-fold literal text for keying.
pub(crate) fn fold_literal(text: &str) -> String {
    if text.is_ascii() {
        text.to_ascii_lowercase()
    } else {
        text.to_lowercase()
    }
}

/// The built tree: an arena of nodes plus the root index.
#[derive(Debug)]
pub struct DfaTree {
    nodes: Vec<DfaNode>,
    root: NodeId,
}

impl DfaTree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![DfaNode::default()],
            root: 0,
        }
    }

    /// The root node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &DfaNode {
        &self.nodes[id]
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty (it never is; a tree always has a root).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut DfaNode {
        &mut self.nodes[id]
    }

    pub(crate) fn add_node(&mut self, node: DfaNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Visit every reachable node exactly once, in deterministic order.
    ///
    /// The catch-all self-loop makes the graph cyclic; the visited set is
    /// what terminates the walk.
    pub fn visit(&self, mut f: impl FnMut(NodeId, &DfaNode)) {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if visited[id] {
                continue;
            }
            visited[id] = true;
            let node = &self.nodes[id];
            f(id, node);

            let mut literal_keys: Vec<&String> = node.literals.keys().collect();
            literal_keys.sort();
            for key in literal_keys.into_iter().rev() {
                stack.push(node.literals[key].node);
            }
            if let Some(parameters) = node.parameters {
                stack.push(parameters);
            }
            if let Some(catch_all) = node.catch_all {
                stack.push(catch_all);
            }
            for (_, child) in node.policy_edges.iter().rev() {
                stack.push(*child);
            }
        }
    }
}
