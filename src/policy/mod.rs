//! # Policy Module
//!
//! Matcher policies plug orthogonal routing concerns - HTTP method, host,
//! content type, content negotiation - into tree construction and
//! per-request evaluation without the core knowing about any of them.
//!
//! A policy is identified by which of three independent capabilities it
//! implements; any subset is allowed:
//!
//! - **ordering** ([`EndpointComparerPolicy`]): a secondary endpoint
//!   comparison used to break priority ties when sorting endpoints at a
//!   tree node,
//! - **node building** ([`NodeBuilderPolicy`]): expands a terminal tree
//!   node into policy-edge children keyed by opaque [`PolicyEdgeKey`]
//!   tokens, and lowers those edges into a [`PolicyJumpTable`],
//! - **endpoint selection** ([`EndpointSelectorPolicy`]): a per-request
//!   filtering pass over an already-matched candidate set, which may
//!   invalidate candidates or short-circuit with a terminal endpoint.
//!
//! Policies are resolved once at matcher-build time into three typed lists,
//! ascending by [`MatcherPolicy::order`]; no type tests run per request.

pub mod content_type;
pub mod header;
pub mod host;
pub mod http_method;
pub mod negotiation;

use crate::candidate::CandidateSet;
use crate::endpoint::Endpoint;
use crate::request::RequestContext;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An opaque policy-edge key. Equality and hashing semantics are private to
/// the owning policy; the tree only needs key identity to deduplicate
/// edges.
pub trait EdgeKey: Any + fmt::Debug + Send + Sync {
    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
    /// Type-checked equality.
    fn dyn_eq(&self, other: &dyn EdgeKey) -> bool;
    /// Hash through the erased type.
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T> EdgeKey for T
where
    T: Any + fmt::Debug + Send + Sync + Eq + Hash,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn EdgeKey) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }
}

/// Shared handle to an edge key, usable as a map key.
#[derive(Debug, Clone)]
pub struct PolicyEdgeKey(Arc<dyn EdgeKey>);

impl PolicyEdgeKey {
    /// Wrap a concrete key.
    #[must_use]
    pub fn new<T: EdgeKey>(key: T) -> Self {
        Self(Arc::new(key))
    }

    /// Borrow the concrete key back, if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: EdgeKey>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for PolicyEdgeKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for PolicyEdgeKey {}

impl Hash for PolicyEdgeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

/// One edge a node-builder policy contributes to the tree: the key plus the
/// endpoints compatible with it, relative order preserved.
#[derive(Debug, Clone)]
pub struct PolicyNodeEdge {
    /// Opaque key labeling the edge
    pub key: PolicyEdgeKey,
    /// Endpoints reachable through this edge, in input order
    pub endpoints: Vec<Arc<Endpoint>>,
}

/// A lowered policy edge: the key plus the destination state index its
/// child node received.
#[derive(Debug, Clone)]
pub struct PolicyJumpTableEdge {
    /// Opaque key labeling the edge
    pub key: PolicyEdgeKey,
    /// Destination state index
    pub destination: usize,
}

/// Request-time lookup over a node's policy edges.
pub trait PolicyJumpTable: fmt::Debug + Send + Sync {
    /// Destination state for this request.
    fn get_destination(&self, request: &RequestContext) -> usize;
}

/// Ordering capability: a secondary endpoint comparison.
pub trait EndpointComparerPolicy {
    /// Compare two endpoints; runs after Order and precedence.
    fn compare_endpoints(&self, a: &Endpoint, b: &Endpoint) -> Ordering;
}

/// Tree-time capability: expand terminal nodes into policy-edge children.
pub trait NodeBuilderPolicy {
    /// Whether this policy wants to branch a node holding `endpoints`.
    ///
    /// Must reject sets containing dynamic endpoints; those bypass the
    /// static tree and rely on the selector capability instead.
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool;

    /// Partition `endpoints` into keyed edges.
    ///
    /// Implementations must preserve endpoint relative order within each
    /// edge and include a synthesized low-priority rejection endpoint for
    /// whichever key represents "no match", so request-time evaluation
    /// always has an exit.
    fn get_edges(&self, endpoints: &[Arc<Endpoint>]) -> Vec<PolicyNodeEdge>;

    /// Lower the edges into a request-time jump table.
    fn build_jump_table(
        &self,
        exit_destination: usize,
        edges: &[PolicyJumpTableEdge],
    ) -> Arc<dyn PolicyJumpTable>;
}

/// Request-time capability: filter an already-matched candidate set.
pub trait EndpointSelectorPolicy {
    /// Whether this policy must run for a state holding `endpoints`.
    ///
    /// For sets containing dynamic endpoints this must return true
    /// unconditionally, since nothing could be precomputed for them.
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool;

    /// Filter the candidate set in place.
    ///
    /// Returning an endpoint short-circuits selection with that terminal
    /// endpoint (e.g. a synthesized rejection); later policies do not run.
    fn apply(&self, request: &RequestContext, candidates: &mut CandidateSet)
        -> Option<Arc<Endpoint>>;
}

/// A matcher policy: some subset of the three capabilities plus an order.
///
/// The capability accessors return `None` by default; implementations
/// override the ones they support with `Some(self)`.
pub trait MatcherPolicy: fmt::Debug + Send + Sync {
    /// Relative order among policies; lower runs first.
    fn order(&self) -> i32 {
        0
    }

    /// Ordering capability, if implemented.
    fn comparer(&self) -> Option<&dyn EndpointComparerPolicy> {
        None
    }

    /// Node-builder capability, if implemented.
    fn node_builder(&self) -> Option<&dyn NodeBuilderPolicy> {
        None
    }

    /// Endpoint-selector capability, if implemented.
    fn endpoint_selector(&self) -> Option<&dyn EndpointSelectorPolicy> {
        None
    }
}

/// The built-in policy set: HTTP method, content type, and host, in their
/// conventional run order (method first).
#[must_use]
pub fn default_policies() -> Vec<Arc<dyn MatcherPolicy>> {
    vec![
        Arc::new(http_method::HttpMethodPolicy),
        Arc::new(content_type::ContentTypePolicy),
        Arc::new(host::HostPolicy),
    ]
}

/// Compare two endpoints by presence of metadata type `T`: endpoints
/// carrying the metadata sort before endpoints without it.
///
/// This is the standard ordering contribution - a policy's configured
/// endpoints are more specific than unconfigured ones.
#[must_use]
pub fn compare_metadata_presence<T: Any + Send + Sync>(a: &Endpoint, b: &Endpoint) -> Ordering {
    match (a.metadata.contains::<T>(), b.metadata.contains::<T>()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Hash)]
    struct IntKey(i32);

    #[derive(Debug, PartialEq, Eq, Hash)]
    struct BoolKey(bool);

    #[test]
    fn test_edge_key_equality_is_type_checked() {
        let a = PolicyEdgeKey::new(IntKey(1));
        let b = PolicyEdgeKey::new(IntKey(1));
        let c = PolicyEdgeKey::new(IntKey(2));
        let d = PolicyEdgeKey::new(BoolKey(true));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_edge_key_as_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(PolicyEdgeKey::new(IntKey(7)), "seven");
        assert_eq!(map.get(&PolicyEdgeKey::new(IntKey(7))), Some(&"seven"));
        assert_eq!(map.get(&PolicyEdgeKey::new(IntKey(8))), None);
    }

    #[test]
    fn test_downcast() {
        let key = PolicyEdgeKey::new(IntKey(3));
        assert_eq!(key.downcast_ref::<IntKey>(), Some(&IntKey(3)));
        assert!(key.downcast_ref::<BoolKey>().is_none());
    }
}
