//! Breadth-first tree construction.

use super::{fold_literal, DfaNode, DfaTree, LiteralEdge, NodeId};
use crate::endpoint::Endpoint;
use crate::error::BuildError;
use crate::pattern::{build_precedence_digit, ParameterPart, PatternSegment, RoutePattern};
use crate::policy::MatcherPolicy;
use std::sync::Arc;
use tracing::debug;

/// Builds the [`DfaTree`] for a sorted endpoint list.
///
/// Construction is breadth-first over path depth. At every depth the work
/// list is re-sorted by each item's per-segment precedence digit (literal <
/// constrained parameter/complex < plain parameter < constrained catch-all
/// < catch-all): edge discovery order is what makes generic branches attach
/// *through* the more specific literal branches created before them, so
/// this ordering is load-bearing, not cosmetic.
pub struct DfaTreeBuilder<'a> {
    endpoints: &'a [Arc<Endpoint>],
    node_builder_policies: &'a [Arc<dyn MatcherPolicy>],
    include_labels: bool,
}

struct WorkItem {
    endpoint: Arc<Endpoint>,
    parents: Vec<NodeId>,
}

impl<'a> DfaTreeBuilder<'a> {
    /// `endpoints` must already be sorted by the composite comparer;
    /// `node_builder_policies` must be sorted ascending by policy order.
    pub(crate) fn new(
        endpoints: &'a [Arc<Endpoint>],
        node_builder_policies: &'a [Arc<dyn MatcherPolicy>],
        include_labels: bool,
    ) -> Self {
        Self {
            endpoints,
            node_builder_policies,
            include_labels,
        }
    }

    /// Build the literal/parameter/catch-all tree, then layer policy edges
    /// on top.
    pub fn build(&self) -> Result<DfaTree, BuildError> {
        let mut tree = DfaTree::new();
        if self.include_labels {
            tree.node_mut(tree.root()).label = Some("/".to_string());
        }

        let max_depth = self
            .endpoints
            .iter()
            .filter_map(|e| e.pattern.as_ref())
            .map(|p| p.segment_count())
            .max()
            .unwrap_or(0);

        let mut work: Vec<WorkItem> = self
            .endpoints
            .iter()
            .map(|endpoint| WorkItem {
                endpoint: Arc::clone(endpoint),
                parents: vec![tree.root()],
            })
            .collect();

        for depth in 0..=max_depth {
            // Stable sort: items keep comparer order within a digit.
            work.sort_by_key(|item| {
                current_segment(&item.endpoint, depth)
                    .zip(item.endpoint.pattern.as_deref())
                    .map_or(0, |(segment, pattern)| build_precedence_digit(pattern, segment))
            });

            let mut next_work: Vec<WorkItem> = Vec::new();
            for item in &work {
                if !has_additional_required_segments(&item.endpoint, depth) {
                    for &parent in &item.parents {
                        tree.node_mut(parent).add_match(&item.endpoint);
                    }
                }

                let Some(pattern) = item.endpoint.pattern.clone() else {
                    continue;
                };
                if current_segment(&item.endpoint, depth).is_none() {
                    continue;
                }
                let segment = &pattern.segments()[segment_index(&pattern, depth)];

                let mut next_parents: Vec<NodeId> = Vec::new();
                for &parent in &item.parents {
                    self.process_segment(
                        &mut tree,
                        &item.endpoint,
                        &pattern,
                        segment,
                        parent,
                        &mut next_parents,
                    )?;
                }
                if !next_parents.is_empty() {
                    next_work.push(WorkItem {
                        endpoint: Arc::clone(&item.endpoint),
                        parents: next_parents,
                    });
                }
            }
            work = next_work;
        }

        self.apply_policies(&mut tree)?;

        debug!(nodes = tree.len(), max_depth, "route tree built");
        Ok(tree)
    }

    fn process_segment(
        &self,
        tree: &mut DfaTree,
        endpoint: &Arc<Endpoint>,
        pattern: &RoutePattern,
        segment: &PatternSegment,
        parent: NodeId,
        next_parents: &mut Vec<NodeId>,
    ) -> Result<(), BuildError> {
        if let Some(text) = segment.as_literal() {
            next_parents.push(self.add_literal(tree, parent, text));
            return Ok(());
        }

        if let Some(parameter) = segment.as_parameter() {
            if let Some(required) = pattern.required_value_for(&parameter.name) {
                if !parameter.is_catch_all() {
                    // The required value collapses the parameter into a
                    // literal edge.
                    if required.is_empty() {
                        return Err(BuildError::EmptyRequiredValue {
                            parameter: parameter.name.to_string(),
                        });
                    }
                    next_parents.push(self.add_literal(tree, parent, required));
                    return Ok(());
                }
            }

            if parameter.is_catch_all() {
                // A catch-all matches at the parent itself (zero remaining
                // segments) and at every node below it: traverse all
                // literal and parameter branches, and add the self-looping
                // node that absorbs arbitrary further segments.
                let mut literal_children: Vec<NodeId> = sorted_literal_children(tree, parent);
                next_parents.append(&mut literal_children);
                if let Some(parameters) = tree.node(parent).parameters {
                    next_parents.push(parameters);
                }

                let catch_all = match tree.node(parent).catch_all {
                    Some(catch_all) => catch_all,
                    None => {
                        let depth = tree.node(parent).path_depth + 1;
                        let label = self.child_label(tree, parent, "{**}");
                        let id = tree.add_node(DfaNode {
                            path_depth: depth,
                            label,
                            ..DfaNode::default()
                        });
                        let node = tree.node_mut(id);
                        node.parameters = Some(id);
                        node.catch_all = Some(id);
                        tree.node_mut(parent).catch_all = Some(id);
                        id
                    }
                };
                tree.node_mut(catch_all).add_match(endpoint);
                return Ok(());
            }

            // Plain or constrained parameter: traverse sibling literals the
            // parameter could also match (pruned by any literal-capable
            // constraints), plus the shared parameter branch.
            for child in sorted_literal_children_filtered(tree, parent, |text| {
                literal_satisfies_constraints(pattern, parameter, text)
            }) {
                next_parents.push(child);
            }
            next_parents.push(self.ensure_parameters(tree, parent));
            return Ok(());
        }

        // Complex segment: could match any path segment, so it traverses
        // every literal branch and continues through the parameter node.
        let mut literal_children = sorted_literal_children(tree, parent);
        next_parents.append(&mut literal_children);
        next_parents.push(self.ensure_parameters(tree, parent));
        Ok(())
    }

    fn add_literal(&self, tree: &mut DfaTree, parent: NodeId, text: &str) -> NodeId {
        let folded = fold_literal(text);
        if let Some(edge) = tree.node(parent).literals.get(&folded) {
            return edge.node;
        }
        let depth = tree.node(parent).path_depth + 1;
        let label = self.child_label(tree, parent, text);
        let id = tree.add_node(DfaNode {
            path_depth: depth,
            label,
            ..DfaNode::default()
        });
        tree.node_mut(parent).literals.insert(
            folded,
            LiteralEdge {
                text: text.to_string(),
                node: id,
            },
        );
        id
    }

    fn ensure_parameters(&self, tree: &mut DfaTree, parent: NodeId) -> NodeId {
        if let Some(parameters) = tree.node(parent).parameters {
            return parameters;
        }
        let depth = tree.node(parent).path_depth + 1;
        let label = self.child_label(tree, parent, "{*}");
        let id = tree.add_node(DfaNode {
            path_depth: depth,
            label,
            ..DfaNode::default()
        });
        tree.node_mut(parent).parameters = Some(id);
        id
    }

    fn child_label(&self, tree: &DfaTree, parent: NodeId, text: &str) -> Option<String> {
        if !self.include_labels {
            return None;
        }
        let base = tree.node(parent).label.as_deref().unwrap_or("");
        Some(format!("{}{}/", base, text))
    }

    /// Post-order policy application: each still-terminal node offers its
    /// matches to the node-builder policies in ascending order; the first
    /// policy that applies replaces the matches with policy-edge children,
    /// and those children continue with the remaining policies.
    fn apply_policies(&self, tree: &mut DfaTree) -> Result<(), BuildError> {
        if self.node_builder_policies.is_empty() {
            return Ok(());
        }
        let mut ids: Vec<NodeId> = Vec::new();
        tree.visit(|id, _| ids.push(id));
        for id in ids {
            self.expand_node(tree, id, 0);
        }
        Ok(())
    }

    fn expand_node(&self, tree: &mut DfaTree, id: NodeId, first_policy: usize) {
        if tree.node(id).matches.is_empty() {
            return;
        }
        for (index, policy) in self
            .node_builder_policies
            .iter()
            .enumerate()
            .skip(first_policy)
        {
            let Some(node_builder) = policy.node_builder() else {
                continue;
            };
            if !node_builder.applies_to_endpoints(&tree.node(id).matches) {
                continue;
            }

            let edges = node_builder.get_edges(&tree.node(id).matches);
            tree.node_mut(id).matches.clear();
            tree.node_mut(id).node_builder = Some(Arc::clone(policy));

            let depth = tree.node(id).path_depth;
            let label = tree.node(id).label.clone();
            for edge in edges {
                let child = tree.add_node(DfaNode {
                    path_depth: depth,
                    label: label.clone(),
                    matches: edge.endpoints,
                    ..DfaNode::default()
                });
                tree.node_mut(id).policy_edges.push((edge.key, child));
                self.expand_node(tree, child, index + 1);
            }
            return;
        }
    }
}

fn segment_index(pattern: &RoutePattern, depth: usize) -> usize {
    // Beyond the declared depth only a trailing catch-all keeps consuming.
    depth.min(pattern.segment_count().saturating_sub(1))
}

/// The segment an endpoint presents at `depth`, or `None` when the
/// endpoint has no further segments. A trailing catch-all repeats forever.
fn current_segment(endpoint: &Arc<Endpoint>, depth: usize) -> Option<&PatternSegment> {
    let pattern = endpoint.pattern.as_deref()?;
    let segments = pattern.segments();
    if depth < segments.len() {
        return Some(&segments[depth]);
    }
    let last = segments.last()?;
    if last
        .as_parameter()
        .is_some_and(ParameterPart::is_catch_all)
    {
        return Some(last);
    }
    None
}

/// Whether the endpoint still requires path content at or beyond `depth`.
///
/// Optional parameters, parameters with defaults, catch-alls, and
/// parameters whose required value is satisfied by their default are not
/// required; literals, complex segments, and everything else is.
fn has_additional_required_segments(endpoint: &Arc<Endpoint>, depth: usize) -> bool {
    let Some(pattern) = endpoint.pattern.as_deref() else {
        return false;
    };
    let segments = pattern.segments();
    let start = depth.min(segments.len());
    for segment in &segments[start..] {
        let Some(parameter) = segment.as_parameter() else {
            // literal or complex segment
            return true;
        };
        if parameter.is_catch_all() {
            return false;
        }
        if let Some(required) = pattern.required_value_for(&parameter.name) {
            let satisfied = pattern
                .default_for(&parameter.name)
                .and_then(|v| v.as_str())
                .is_some_and(|default| default == required);
            if satisfied {
                continue;
            }
            return true;
        }
        if parameter.is_optional() || pattern.default_for(&parameter.name).is_some() {
            continue;
        }
        return true;
    }
    false
}

fn literal_satisfies_constraints(
    pattern: &RoutePattern,
    parameter: &ParameterPart,
    text: &str,
) -> bool {
    pattern
        .policies_for(&parameter.name)
        .iter()
        .filter_map(|policy| policy.as_constraint())
        .all(|constraint| {
            constraint
                .matches_literal(&parameter.name, text)
                .unwrap_or(true)
        })
}

fn sorted_literal_children(tree: &DfaTree, parent: NodeId) -> Vec<NodeId> {
    sorted_literal_children_filtered(tree, parent, |_| true)
}

fn sorted_literal_children_filtered(
    tree: &DfaTree,
    parent: NodeId,
    mut keep: impl FnMut(&str) -> bool,
) -> Vec<NodeId> {
    let mut edges: Vec<(&String, &LiteralEdge)> = tree.node(parent).literals.iter().collect();
    edges.sort_by_key(|(folded, _)| *folded);
    edges
        .into_iter()
        .filter(|(_, edge)| keep(&edge.text))
        .map(|(_, edge)| edge.node)
        .collect()
}
