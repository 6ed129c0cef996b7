//! Lowering: flatten the build-time tree into the immutable state array.

use super::{DfaTree, LiteralEdge, NodeId};
use crate::candidate::{create_candidates, Candidate};
use crate::comparer::EndpointComparer;
use crate::config::JumpTableTuning;
use crate::error::BuildError;
use crate::jump_table::{JumpTable, JumpTableBuilder};
use crate::policy::{MatcherPolicy, PolicyJumpTable, PolicyJumpTableEdge};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One immutable matcher state, indexed by integer destination.
#[derive(Debug, Clone)]
pub struct DfaState {
    /// Candidates terminal at this state, ascending by score
    pub candidates: Arc<[Candidate]>,
    /// Endpoint-selector policies that apply to this state's candidates,
    /// ascending by policy order
    pub policies: Arc<[Arc<dyn MatcherPolicy>]>,
    /// Path-segment transitions
    pub path_transitions: Arc<dyn JumpTable>,
    /// Policy transitions; `None` when the node has no policy edges
    pub policy_transitions: Option<Arc<dyn PolicyJumpTable>>,
}

/// Flatten `tree` into a state array.
///
/// A depth-first traversal assigns each reachable node a stable index; an
/// explicit one-past-the-end exit state with an always-exit jump table is
/// appended. The catch-all self-loop is detected through the index map and
/// not re-traversed.
pub(crate) fn lower(
    tree: &DfaTree,
    comparer: &EndpointComparer,
    selector_policies: &[Arc<dyn MatcherPolicy>],
    tuning: &JumpTableTuning,
) -> Result<Vec<DfaState>, BuildError> {
    // Pass 1: assign indices in deterministic DFS order.
    let mut index_of: HashMap<NodeId, usize> = HashMap::new();
    let mut order: Vec<NodeId> = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        if index_of.contains_key(&id) {
            continue;
        }
        index_of.insert(id, order.len());
        order.push(id);

        let node = tree.node(id);
        // Push children in reverse so they are discovered in edge order:
        // literals (sorted), parameters, catch-all, policy edges.
        for (_, child) in node.policy_edges.iter().rev() {
            stack.push(*child);
        }
        if let Some(catch_all) = node.catch_all {
            stack.push(catch_all);
        }
        if let Some(parameters) = node.parameters {
            stack.push(parameters);
        }
        for edge in sorted_literals(node).into_iter().rev() {
            stack.push(edge.node);
        }
    }

    let exit_index = order.len();

    // Pass 2: build states.
    let mut states = Vec::with_capacity(order.len() + 1);
    for &id in &order {
        let node = tree.node(id);

        let mut builder = JumpTableBuilder::new();
        for edge in sorted_literals(node) {
            builder.entry(&edge.text, index_of[&edge.node]);
        }

        // Default handles non-matching segments (fall through to the
        // parameter branch); exit handles zero-length segments (only a
        // catch-all accepts those). Three shapes: no parameter branch,
        // parameter only, and parameter plus catch-all - which collapse to
        // one destination when they are the same self-looping node.
        match (node.parameters, node.catch_all) {
            (Some(parameters), Some(catch_all)) if parameters == catch_all => {
                let destination = index_of[&parameters];
                builder.default_destination(destination);
                builder.exit_destination(destination);
            }
            (Some(parameters), Some(catch_all)) => {
                builder.default_destination(index_of[&parameters]);
                builder.exit_destination(index_of[&catch_all]);
            }
            (None, Some(catch_all)) => {
                let destination = index_of[&catch_all];
                builder.default_destination(destination);
                builder.exit_destination(destination);
            }
            (Some(parameters), None) => {
                builder.default_destination(index_of[&parameters]);
                builder.exit_destination(exit_index);
            }
            (None, None) => {
                builder.default_destination(exit_index);
                builder.exit_destination(exit_index);
            }
        }
        let path_transitions = builder.build(tuning)?;

        let policy_transitions = match &node.node_builder {
            Some(policy) if !node.policy_edges.is_empty() => {
                policy.node_builder().map(|node_builder| {
                    let edges: Vec<PolicyJumpTableEdge> = node
                        .policy_edges
                        .iter()
                        .map(|(key, child)| PolicyJumpTableEdge {
                            key: key.clone(),
                            destination: index_of[child],
                        })
                        .collect();
                    node_builder.build_jump_table(exit_index, &edges)
                })
            }
            _ => None,
        };

        // Terminal matches become candidates in composite-comparer order;
        // the dense score rank assigned here is what selection and
        // ambiguity detection run on.
        let mut matches = node.matches.clone();
        matches.sort_by(|a, b| comparer.compare(a, b));
        let candidates = create_candidates(&matches, comparer);

        let policies: Vec<Arc<dyn MatcherPolicy>> = if matches.is_empty() {
            Vec::new()
        } else {
            selector_policies
                .iter()
                .filter(|policy| {
                    policy
                        .endpoint_selector()
                        .is_some_and(|s| s.applies_to_endpoints(&matches))
                })
                .map(Arc::clone)
                .collect()
        };

        states.push(DfaState {
            candidates: candidates.into(),
            policies: policies.into(),
            path_transitions,
            policy_transitions,
        });
    }

    // The exit state loops to itself with no candidates; requests that fall
    // off the tree land here and finish unmatched.
    let mut exit_builder = JumpTableBuilder::new();
    exit_builder.default_destination(exit_index);
    exit_builder.exit_destination(exit_index);
    states.push(DfaState {
        candidates: Arc::from([]),
        policies: Arc::from([]),
        path_transitions: exit_builder.build(tuning)?,
        policy_transitions: None,
    });

    debug!(states = states.len(), "route tree lowered to state array");
    Ok(states)
}

fn sorted_literals(node: &super::DfaNode) -> Vec<&LiteralEdge> {
    let mut edges: Vec<(&String, &LiteralEdge)> = node.literals.iter().collect();
    edges.sort_by_key(|(folded, _)| *folded);
    edges.into_iter().map(|(_, edge)| edge).collect()
}
