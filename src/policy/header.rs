//! Header-match policy.
//!
//! Invalidates candidates whose declared header requirement the request
//! does not satisfy. Matching is exact or prefix, ASCII case-insensitive,
//! and inspects at most a configured number of header occurrences per
//! candidate - a deliberate bound against pathological multi-valued
//! headers. No rejection endpoint is synthesized; an unmatched header is a
//! plain 404.

use super::{EndpointComparerPolicy, EndpointSelectorPolicy, MatcherPolicy};
use crate::candidate::CandidateSet;
use crate::endpoint::{contains_dynamic_endpoints, Endpoint};
use crate::request::RequestContext;
use std::cmp::Ordering;
use std::sync::Arc;

/// How declared values are compared against request header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatchMode {
    /// The header value must equal a declared value
    Exact,
    /// The header value must start with a declared value
    Prefix,
}

/// Requires one header to match one of the declared values.
#[derive(Debug, Clone)]
pub struct HeaderMatchMetadata {
    /// Header name, matched case-insensitively
    pub name: String,
    /// Acceptable values; at least one must match
    pub values: Vec<String>,
    /// Comparison mode
    pub mode: HeaderMatchMode,
}

impl HeaderMatchMetadata {
    /// Require `name` to exactly equal one of `values`.
    #[must_use]
    pub fn exact(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            mode: HeaderMatchMode::Exact,
        }
    }

    /// Require `name` to start with one of `values`.
    #[must_use]
    pub fn prefix(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            mode: HeaderMatchMode::Prefix,
        }
    }
}

/// The policy.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPolicy {
    /// Maximum request header occurrences inspected per candidate
    pub max_inspected_values: usize,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            max_inspected_values: 8,
        }
    }
}

impl HeaderPolicy {
    fn satisfied(&self, metadata: &HeaderMatchMetadata, request: &RequestContext) -> bool {
        request
            .header_values(&metadata.name)
            .take(self.max_inspected_values)
            .any(|value| {
                metadata.values.iter().any(|declared| match metadata.mode {
                    HeaderMatchMode::Exact => value.eq_ignore_ascii_case(declared),
                    HeaderMatchMode::Prefix => value
                        .get(..declared.len())
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(declared)),
                })
            })
    }
}

impl MatcherPolicy for HeaderPolicy {
    fn order(&self) -> i32 {
        0
    }

    fn comparer(&self) -> Option<&dyn EndpointComparerPolicy> {
        Some(self)
    }

    fn endpoint_selector(&self) -> Option<&dyn EndpointSelectorPolicy> {
        Some(self)
    }
}

impl EndpointComparerPolicy for HeaderPolicy {
    fn compare_endpoints(&self, a: &Endpoint, b: &Endpoint) -> Ordering {
        super::compare_metadata_presence::<HeaderMatchMetadata>(a, b)
    }
}

impl EndpointSelectorPolicy for HeaderPolicy {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        contains_dynamic_endpoints(endpoints)
            || endpoints
                .iter()
                .any(|e| e.metadata.get::<HeaderMatchMetadata>().is_some())
    }

    fn apply(
        &self,
        request: &RequestContext,
        candidates: &mut CandidateSet,
    ) -> Option<Arc<Endpoint>> {
        for index in 0..candidates.len() {
            if !candidates.is_valid(index) {
                continue;
            }
            let Some(metadata) = candidates
                .endpoint(index)
                .metadata
                .get::<HeaderMatchMetadata>()
            else {
                continue;
            };
            if metadata.values.is_empty() {
                // Declared with no values: the header just has to be
                // present.
                if request.header(&metadata.name).is_none() {
                    candidates.set_validity(index, false);
                }
                continue;
            }
            if !self.satisfied(metadata, request) {
                candidates.set_validity(index, false);
            }
        }
        None
    }
}
