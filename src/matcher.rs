//! Matcher core module - hot path for request matching.
//!
//! # JSF Compliance (Rule 206)
//!
//! This module is part of the request hot path. The following clippy lints
//! are denied to enforce "no heap allocations after initialization":
//!
//! - `clippy::inefficient_to_string` - Catches unnecessary allocations
//! - `clippy::format_push_string` - Prevents format! string building

// JSF Rule 206: Deny heap allocations in the hot path
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use crate::candidate::{Candidate, CandidateFlags, CandidateSet, CandidateState};
use crate::comparer::EndpointComparer;
use crate::config::MatcherConfig;
use crate::endpoint::Endpoint;
use crate::error::{BuildError, MatchError};
use crate::pattern::match_complex_segment;
use crate::policy::MatcherPolicy;
use crate::request::RequestContext;
use crate::segments::{tokenize, PathSegment};
use crate::selector::{DefaultEndpointSelector, EndpointSelector};
use crate::tree::{lower, DfaState, DfaTree, DfaTreeBuilder};
use crate::values::RouteValues;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum path segments held inline per request. Deeper paths spill to the
/// heap, which is rare enough not to matter.
const MAX_INLINE_SEGMENTS: usize = 16;

/// Result of successfully matching a request to an endpoint.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The selected endpoint (possibly a synthetic rejection endpoint)
    pub endpoint: Arc<Endpoint>,
    /// Route values extracted from the path, with defaults applied
    pub values: RouteValues,
}

/// Builds a [`DfaMatcher`] from endpoints and policies.
pub struct DfaMatcherBuilder {
    endpoints: Vec<Arc<Endpoint>>,
    policies: Vec<Arc<dyn MatcherPolicy>>,
    comparer: EndpointComparer,
    config: MatcherConfig,
    selector: Arc<dyn EndpointSelector>,
    default_selector: bool,
}

impl DfaMatcherBuilder {
    /// Create a builder with an explicit policy set.
    #[must_use]
    pub fn new(policies: Vec<Arc<dyn MatcherPolicy>>) -> Self {
        let comparer = EndpointComparer::new(&policies);
        Self {
            endpoints: Vec::new(),
            policies,
            comparer,
            config: MatcherConfig::default(),
            selector: Arc::new(DefaultEndpointSelector),
            default_selector: true,
        }
    }

    /// Create a builder with the built-in policy set: HTTP method, host,
    /// and content type.
    #[must_use]
    pub fn with_default_policies() -> Self {
        Self::new(crate::policy::default_policies())
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the endpoint selector.
    #[must_use]
    pub fn with_selector(mut self, selector: Arc<dyn EndpointSelector>) -> Self {
        self.selector = selector;
        self.default_selector = false;
        self
    }

    /// Register an endpoint.
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> &mut Self {
        self.endpoints.push(Arc::new(endpoint));
        self
    }

    /// Register an already-shared endpoint.
    pub fn add_shared_endpoint(&mut self, endpoint: Arc<Endpoint>) -> &mut Self {
        self.endpoints.push(endpoint);
        self
    }

    /// The composite comparer resolved from the registered policies.
    #[must_use]
    pub fn comparer(&self) -> &EndpointComparer {
        &self.comparer
    }

    fn sorted_endpoints(&self) -> Vec<Arc<Endpoint>> {
        let mut endpoints = self.endpoints.clone();
        endpoints.sort_by(|a, b| self.comparer.compare(a, b));
        endpoints
    }

    fn node_builder_policies(&self) -> Vec<Arc<dyn MatcherPolicy>> {
        let mut policies: Vec<Arc<dyn MatcherPolicy>> = self
            .policies
            .iter()
            .filter(|p| p.node_builder().is_some())
            .map(Arc::clone)
            .collect();
        policies.sort_by_key(|p| p.order());
        policies
    }

    fn selector_policies(&self) -> Vec<Arc<dyn MatcherPolicy>> {
        let mut policies: Vec<Arc<dyn MatcherPolicy>> = self
            .policies
            .iter()
            .filter(|p| p.endpoint_selector().is_some())
            .map(Arc::clone)
            .collect();
        policies.sort_by_key(|p| p.order());
        policies
    }

    /// Build the intermediate tree. Exposed for diagnostics and tests; the
    /// usual entry point is [`build`](Self::build).
    pub fn build_tree(&self) -> Result<DfaTree, BuildError> {
        let endpoints = self.sorted_endpoints();
        let node_builders = self.node_builder_policies();
        DfaTreeBuilder::new(&endpoints, &node_builders, self.config.include_labels).build()
    }

    /// Build the matcher: tree construction, policy application, lowering.
    pub fn build(&self) -> Result<DfaMatcher, BuildError> {
        let tree = self.build_tree()?;
        let selector_policies = self.selector_policies();
        let states = lower(
            &tree,
            &self.comparer,
            &selector_policies,
            &self.config.jump_tables,
        )?;

        let max_segment_count = self
            .endpoints
            .iter()
            .filter_map(|e| e.pattern.as_ref())
            .map(|p| p.segment_count())
            .max()
            .unwrap_or(0);

        // RT5: Routing table loaded
        info!(
            endpoints = self.endpoints.len(),
            states = states.len(),
            max_segment_count,
            "Routing table loaded into DFA state array"
        );

        Ok(DfaMatcher {
            states,
            max_segment_count,
            selector: Arc::clone(&self.selector),
            default_selector: self.default_selector,
        })
    }
}

/// The request-time matching engine.
///
/// Wholly immutable after construction: the state array, jump tables, and
/// candidate prototypes are shared freely across request threads without
/// locking. All mutable state lives in per-request locals.
#[derive(Debug, Clone)]
pub struct DfaMatcher {
    states: Vec<DfaState>,
    max_segment_count: usize,
    selector: Arc<dyn EndpointSelector>,
    default_selector: bool,
}

impl DfaMatcher {
    /// Match a request to an endpoint.
    ///
    /// Returns `Ok(None)` when nothing matched (the caller normally
    /// responds 404); policy rejections (405/415/406) surface as a normal
    /// match whose endpoint carries
    /// [`RejectionMetadata`](crate::endpoint::RejectionMetadata).
    pub fn match_request(
        &self,
        request: &RequestContext,
    ) -> Result<Option<RouteMatch>, MatchError> {
        // RT1: Route match attempt
        debug!(method = %request.method, path = %request.path, "Route match attempt");
        let match_start = std::time::Instant::now();

        let path = request.path.as_str();
        let mut buffer: SmallVec<[PathSegment; MAX_INLINE_SEGMENTS]> =
            smallvec::smallvec![PathSegment::default(); self.max_segment_count + 1];
        let count = tokenize(path, &mut buffer);

        let mut current = 0usize;
        for segment in &buffer[..count] {
            current = self.states[current]
                .path_transitions
                .get_destination(path, *segment);
        }
        while let Some(policy_transitions) = &self.states[current].policy_transitions {
            current = policy_transitions.get_destination(request);
        }

        let state = &self.states[current];
        if state.candidates.is_empty() {
            // RT4: No route found (404)
            warn!(
                method = %request.method,
                path = %path,
                duration_us = match_start.elapsed().as_micros(),
                "No route matched"
            );
            return Ok(None);
        }

        // Fast path: a single candidate with nothing to materialize, no
        // policies to consult, and the default selector in use.
        if state.candidates.len() == 1
            && state.policies.is_empty()
            && self.default_selector
            && state.candidates[0].flags.is_empty()
        {
            let endpoint = Arc::clone(&state.candidates[0].endpoint);
            self.log_matched(request, &endpoint, match_start);
            return Ok(Some(RouteMatch {
                endpoint,
                values: RouteValues::new(),
            }));
        }

        let mut candidates = CandidateSet::new(
            state
                .candidates
                .iter()
                .map(|candidate| evaluate_candidate(candidate, request, path, &buffer[..count])),
        );

        for policy in state.policies.iter() {
            if let Some(selector) = policy.endpoint_selector() {
                if let Some(endpoint) = selector.apply(request, &mut candidates) {
                    // A policy short-circuited with a terminal endpoint,
                    // e.g. a synthesized rejection.
                    self.log_matched(request, &endpoint, match_start);
                    return Ok(Some(RouteMatch {
                        endpoint,
                        values: RouteValues::new(),
                    }));
                }
            }
        }

        let selected = self.selector.select(request, candidates)?;
        match &selected {
            Some(route_match) => self.log_matched(request, &route_match.endpoint, match_start),
            None => warn!(
                method = %request.method,
                path = %path,
                duration_us = match_start.elapsed().as_micros(),
                "All candidates eliminated"
            ),
        }
        Ok(selected)
    }

    /// Number of states in the lowered array, including the exit state.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    fn log_matched(
        &self,
        request: &RequestContext,
        endpoint: &Arc<Endpoint>,
        match_start: std::time::Instant,
    ) {
        let match_duration = match_start.elapsed();
        if match_duration > std::time::Duration::from_millis(1) {
            warn!(
                method = %request.method,
                path = %request.path,
                endpoint = %endpoint.display_name,
                duration_us = match_duration.as_micros(),
                "Slow route matching detected"
            );
        } else {
            // RT3: Route matched
            debug!(
                method = %request.method,
                path = %request.path,
                endpoint = %endpoint.display_name,
                duration_us = match_duration.as_micros(),
                "Route matched"
            );
        }
    }
}

/// Maximum slots materialized on the stack.
const MAX_INLINE_SLOTS: usize = 8;

/// Materialize one candidate: copy the slot prototype, fill captures and
/// the catch-all from the path, run deferred complex segments, then
/// constraints. Failures invalidate the candidate rather than erroring.
fn evaluate_candidate(
    candidate: &Candidate,
    request: &RequestContext,
    path: &str,
    segments: &[PathSegment],
) -> CandidateState {
    if candidate.flags.is_empty() {
        return CandidateState::new(
            Arc::clone(&candidate.endpoint),
            RouteValues::new(),
            candidate.score,
        );
    }

    let mut values = RouteValues::with_capacity(candidate.slots.len());

    if candidate.flags.intersects(CandidateFlags::HAS_SLOTS) {
        let mut slots: SmallVec<[(Option<Arc<str>>, Option<Value>); MAX_INLINE_SLOTS]> =
            candidate.slots.iter().cloned().collect();

        for capture in candidate.captures.iter() {
            if capture.segment_index < segments.len() {
                let text = segments[capture.segment_index].text(path);
                slots[capture.slot_index] = (
                    Some(Arc::clone(&capture.name)),
                    Some(Value::String(text.to_string())),
                );
            }
        }

        if let Some(catch_all) = &candidate.catch_all {
            if catch_all.segment_index < segments.len() {
                // A catch-all takes the remainder of the path, separators
                // included.
                let text = &path[segments[catch_all.segment_index].start..];
                slots[catch_all.slot_index] = (
                    Some(Arc::clone(&catch_all.name)),
                    Some(Value::String(text.to_string())),
                );
            }
        }

        for (name, value) in slots {
            if let (Some(name), Some(value)) = (name, value) {
                values.set(name, value);
            }
        }
    }

    let mut valid = true;

    if candidate
        .flags
        .contains(CandidateFlags::HAS_COMPLEX_SEGMENTS)
    {
        if let Some(pattern) = candidate.endpoint.pattern.as_deref() {
            for &segment_index in candidate.complex_segments.iter() {
                let matched = segment_index < segments.len()
                    && match_complex_segment(
                        &pattern.segments()[segment_index],
                        segments[segment_index].text(path),
                        &mut values,
                    );
                if !matched {
                    valid = false;
                    break;
                }
            }
        }
    }

    if valid && candidate.flags.contains(CandidateFlags::HAS_CONSTRAINTS) {
        for constraint in candidate.constraints.iter() {
            if !constraint
                .constraint
                .matches(request, &constraint.name, &values)
            {
                valid = false;
                break;
            }
        }
    }

    let score = if valid {
        candidate.score
    } else {
        !candidate.score
    };
    CandidateState::new(Arc::clone(&candidate.endpoint), values, score)
}
