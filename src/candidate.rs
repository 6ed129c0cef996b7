//! Candidate extraction and the per-request candidate set.
//!
//! A [`Candidate`] is the precomputed description of how one endpoint would
//! be matched and populated if a request lands on its tree node: value
//! slots, capture positions, the catch-all position, deferred complex
//! segments, and the constraint list, plus a dense priority score. The
//! request-scoped [`CandidateSet`] materializes those prototypes and is
//! mutated in place by endpoint-selector policies before selection.

use crate::comparer::EndpointComparer;
use crate::constraint::RouteConstraint;
use crate::endpoint::Endpoint;
use crate::error::BuildError;
use crate::values::RouteValues;
use serde_json::Value;
use smallvec::SmallVec;
use std::ops::BitOr;
use std::sync::Arc;

/// Bitset describing which value-producing features a candidate has.
///
/// A candidate with no flags set can take the matcher's fast path: assign
/// the endpoint, skip value materialization entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CandidateFlags(u8);

impl CandidateFlags {
    /// No value-producing features.
    pub const NONE: Self = Self(0);
    /// At least one slot is pre-seeded with a default value.
    pub const HAS_DEFAULTS: Self = Self(1);
    /// At least one simple parameter capture.
    pub const HAS_CAPTURES: Self = Self(1 << 1);
    /// A catch-all capture.
    pub const HAS_CATCH_ALL: Self = Self(1 << 2);
    /// Complex segments deferred to request time.
    pub const HAS_COMPLEX_SEGMENTS: Self = Self(1 << 3);
    /// Constraints to evaluate against materialized values.
    pub const HAS_CONSTRAINTS: Self = Self(1 << 4);
    /// Any feature that requires slot materialization.
    pub const HAS_SLOTS: Self =
        Self(Self::HAS_DEFAULTS.0 | Self::HAS_CAPTURES.0 | Self::HAS_CATCH_ALL.0);

    /// Whether every flag in `other` is set.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any flag in `other` is set.
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether no flags are set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CandidateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One simple-parameter capture: which path segment fills which slot.
#[derive(Debug, Clone)]
pub struct CandidateCapture {
    /// Parameter name
    pub name: Arc<str>,
    /// Index of the path segment to extract
    pub segment_index: usize,
    /// Index of the slot to fill
    pub slot_index: usize,
}

/// A constraint to evaluate for one parameter.
#[derive(Debug, Clone)]
pub struct CandidateConstraint {
    /// Parameter name the constraint applies to
    pub name: Arc<str>,
    /// The predicate
    pub constraint: Arc<dyn RouteConstraint>,
}

/// Precomputed, immutable match description for one endpoint at one tree
/// node.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The endpoint this candidate selects
    pub endpoint: Arc<Endpoint>,
    /// Dense priority rank within the node; equal scores signal potential
    /// ambiguity
    pub score: i32,
    /// Feature bitset
    pub flags: CandidateFlags,
    /// Slot prototypes: `(name, value)` for pre-seeded defaults, `(None,
    /// None)` placeholders for captures (the capture carries the name)
    pub slots: Arc<[(Option<Arc<str>>, Option<Value>)]>,
    /// Simple parameter captures
    pub captures: Arc<[CandidateCapture]>,
    /// At most one catch-all capture
    pub catch_all: Option<CandidateCapture>,
    /// Indices of complex segments in the endpoint's pattern, matched at
    /// request time against materialized values
    pub complex_segments: Arc<[usize]>,
    /// Constraints collected from the pattern's parameter policies
    pub constraints: Arc<[CandidateConstraint]>,
}

/// Build the candidate description for `endpoint` with the given score.
#[must_use]
pub(crate) fn create_candidate(endpoint: &Arc<Endpoint>, score: i32) -> Candidate {
    let Some(pattern) = endpoint.pattern.clone() else {
        return Candidate {
            endpoint: Arc::clone(endpoint),
            score,
            flags: CandidateFlags::NONE,
            slots: Arc::from([]),
            captures: Arc::from([]),
            catch_all: None,
            complex_segments: Arc::from([]),
            constraints: Arc::from([]),
        };
    };

    let mut flags = CandidateFlags::NONE;
    let mut slots: Vec<(Option<Arc<str>>, Option<Value>)> = Vec::new();
    let mut captures: Vec<CandidateCapture> = Vec::new();
    let mut catch_all = None;
    let mut complex_segments: Vec<usize> = Vec::new();

    // Defaults are processed first, which fixes the slot ordering: defaulted
    // parameters occupy the leading slots, captures without defaults get
    // placeholder slots appended in segment order.
    for (name, value) in pattern.defaults() {
        slots.push((Some(Arc::clone(name)), Some(value.clone())));
        flags = flags | CandidateFlags::HAS_DEFAULTS;
    }

    fn slot_for(name: &str, slots: &mut Vec<(Option<Arc<str>>, Option<Value>)>) -> usize {
        match slots.iter().position(|(n, _)| n.as_deref() == Some(name)) {
            Some(index) => index,
            None => {
                slots.push((None, None));
                slots.len() - 1
            }
        }
    }

    for (segment_index, segment) in pattern.segments().iter().enumerate() {
        if let Some(parameter) = segment.as_parameter() {
            if let Some(required) = pattern.required_value_for(&parameter.name) {
                // The required value collapses this parameter into a literal
                // edge; the value is fixed, no capture is needed.
                let slot_index = slot_for(&parameter.name, &mut slots);
                slots[slot_index] = (
                    Some(Arc::clone(&parameter.name)),
                    Some(Value::String(required.to_string())),
                );
                flags = flags | CandidateFlags::HAS_DEFAULTS;
            } else if parameter.is_catch_all() {
                let slot_index = slot_for(&parameter.name, &mut slots);
                catch_all = Some(CandidateCapture {
                    name: Arc::clone(&parameter.name),
                    segment_index,
                    slot_index,
                });
                flags = flags | CandidateFlags::HAS_CATCH_ALL;
            } else {
                let slot_index = slot_for(&parameter.name, &mut slots);
                captures.push(CandidateCapture {
                    name: Arc::clone(&parameter.name),
                    segment_index,
                    slot_index,
                });
            }
        } else if segment.as_literal().is_none() {
            complex_segments.push(segment_index);
            flags = flags | CandidateFlags::HAS_COMPLEX_SEGMENTS;
        }
    }

    if !captures.is_empty() {
        flags = flags | CandidateFlags::HAS_CAPTURES;
    }

    let mut constraints: Vec<CandidateConstraint> = Vec::new();
    for segment in pattern.segments() {
        for parameter in segment.parameters() {
            for policy in pattern.policies_for(&parameter.name) {
                if let Some(constraint) = policy.as_constraint() {
                    constraints.push(CandidateConstraint {
                        name: Arc::clone(&parameter.name),
                        constraint: Arc::clone(constraint),
                    });
                }
            }
        }
    }
    // Out-of-line constraints may target names with no parameter part; they
    // still run, against defaulted values.
    for (name, policies) in pattern_policies_without_parts(&pattern) {
        for policy in policies {
            if let Some(constraint) = policy.as_constraint() {
                constraints.push(CandidateConstraint {
                    name: Arc::clone(name),
                    constraint: Arc::clone(constraint),
                });
            }
        }
    }
    if !constraints.is_empty() {
        flags = flags | CandidateFlags::HAS_CONSTRAINTS;
    }

    Candidate {
        endpoint: Arc::clone(endpoint),
        score,
        flags,
        slots: slots.into(),
        captures: captures.into(),
        catch_all,
        complex_segments: complex_segments.into(),
        constraints: constraints.into(),
    }
}

fn pattern_policies_without_parts(
    pattern: &crate::pattern::RoutePattern,
) -> Vec<(&Arc<str>, &[crate::constraint::ParameterPolicyRef])> {
    let mut parameter_names: Vec<&str> = Vec::new();
    for segment in pattern.segments() {
        for parameter in segment.parameters() {
            parameter_names.push(&parameter.name);
        }
    }
    pattern
        .policy_entries()
        .iter()
        .filter(|(name, _)| !parameter_names.contains(&name.as_ref()))
        .map(|(name, policies)| (name, policies.as_slice()))
        .collect()
}

/// Build candidates for an already priority-sorted endpoint list.
///
/// Scores are a dense rank: the score increments whenever the comparer
/// finds an endpoint not equal in priority to its predecessor, so
/// equal-priority runs share a score.
#[must_use]
pub(crate) fn create_candidates(
    endpoints: &[Arc<Endpoint>],
    comparer: &EndpointComparer,
) -> Vec<Candidate> {
    let mut candidates = Vec::with_capacity(endpoints.len());
    let mut score = 0i32;
    for (index, endpoint) in endpoints.iter().enumerate() {
        if index > 0 && !comparer.equal_priority(&endpoints[index - 1], endpoint) {
            score += 1;
        }
        candidates.push(create_candidate(endpoint, score));
    }
    candidates
}

/// One mutable candidate within a request's [`CandidateSet`].
///
/// The score's sign bit doubles as the validity flag: `score >= 0` means
/// valid. Invalidating bit-complements the score, which is reversible and
/// preserves the original magnitude for duplicate detection.
#[derive(Debug, Clone)]
pub struct CandidateState {
    endpoint: Arc<Endpoint>,
    values: RouteValues,
    score: i32,
}

impl CandidateState {
    pub(crate) fn new(endpoint: Arc<Endpoint>, values: RouteValues, score: i32) -> Self {
        Self {
            endpoint,
            values,
            score,
        }
    }
}

/// Maximum candidates kept inline; deep route tables rarely produce more
/// per terminal node.
const MAX_INLINE_CANDIDATES: usize = 4;

/// The mutable, request-scoped set of candidates at a terminal state.
///
/// Created fresh per request, mutated in place by endpoint-selector
/// policies, consumed exactly once by the endpoint selector.
#[derive(Debug, Default)]
pub struct CandidateSet {
    states: SmallVec<[CandidateState; MAX_INLINE_CANDIDATES]>,
}

impl CandidateSet {
    /// Build a set from per-candidate states, in score order.
    #[must_use]
    pub fn new(states: impl IntoIterator<Item = CandidateState>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    /// Number of candidates, valid or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the set holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether the candidate at `index` is currently valid.
    #[must_use]
    pub fn is_valid(&self, index: usize) -> bool {
        self.states[index].score >= 0
    }

    /// Mark the candidate at `index` valid or invalid.
    ///
    /// Toggling flips the score's bits, so the original magnitude is
    /// recoverable and repeated calls are idempotent.
    pub fn set_validity(&mut self, index: usize, valid: bool) {
        let state = &mut self.states[index];
        if (state.score >= 0) != valid {
            state.score = !state.score;
        }
    }

    /// The endpoint of the candidate at `index`.
    #[must_use]
    pub fn endpoint(&self, index: usize) -> &Arc<Endpoint> {
        &self.states[index].endpoint
    }

    /// The current score of the candidate at `index` (negative when
    /// invalidated).
    #[must_use]
    pub fn score(&self, index: usize) -> i32 {
        self.states[index].score
    }

    /// The route values of the candidate at `index`.
    #[must_use]
    pub fn values(&self, index: usize) -> &RouteValues {
        &self.states[index].values
    }

    /// Mutable route values of the candidate at `index`.
    pub fn values_mut(&mut self, index: usize) -> &mut RouteValues {
        &mut self.states[index].values
    }

    /// Replace the candidate at `index` with an expansion set, e.g. the
    /// endpoints produced for one dynamic endpoint.
    ///
    /// The replaced candidate must hold a unique priority; otherwise the
    /// expanded endpoints could not be ordered against the tied neighbors
    /// and the error lists the offenders.
    pub fn expand_endpoint(
        &mut self,
        index: usize,
        endpoints: Vec<Arc<Endpoint>>,
        comparer: &EndpointComparer,
    ) -> Result<(), BuildError> {
        let magnitude = |score: i32| if score < 0 { !score } else { score };
        let score = self.states[index].score;
        let original = magnitude(score);

        let duplicates: Vec<String> = self
            .states
            .iter()
            .enumerate()
            .filter(|(i, state)| *i != index && magnitude(state.score) == original)
            .map(|(_, state)| state.endpoint.display_name.clone())
            .collect();
        if !duplicates.is_empty() {
            let mut display_names = vec![self.states[index].endpoint.display_name.clone()];
            display_names.extend(duplicates);
            return Err(BuildError::DuplicateExpansionScore { display_names });
        }

        let mut expanded = endpoints;
        expanded.sort_by(|a, b| comparer.compare(a, b));

        let values = self.states[index].values.clone();
        let replacements: Vec<CandidateState> = expanded
            .into_iter()
            .map(|endpoint| CandidateState::new(endpoint, values.clone(), score))
            .collect();
        let tail: Vec<CandidateState> = self.states.drain(index + 1..).collect();
        self.states.truncate(index);
        self.states.extend(replacements);
        self.states.extend(tail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(name: &str) -> Arc<Endpoint> {
        Arc::new(Endpoint::bare(name, name))
    }

    fn set_of(scores: &[i32]) -> CandidateSet {
        CandidateSet::new(
            scores
                .iter()
                .enumerate()
                .map(|(i, score)| CandidateState::new(bare(&format!("e{i}")), RouteValues::new(), *score)),
        )
    }

    #[test]
    fn test_validity_round_trip() {
        let mut set = set_of(&[0, 1]);
        assert!(set.is_valid(0));
        set.set_validity(0, false);
        assert!(!set.is_valid(0));
        assert_eq!(set.score(0), !0);
        set.set_validity(0, true);
        assert!(set.is_valid(0));
        assert_eq!(set.score(0), 0);
    }

    #[test]
    fn test_set_validity_is_idempotent() {
        let mut set = set_of(&[3]);
        set.set_validity(0, false);
        set.set_validity(0, false);
        assert_eq!(set.score(0), !3);
    }

    #[test]
    fn test_expand_endpoint_rejects_duplicate_priority() {
        let comparer = EndpointComparer::new(&[]);
        let mut set = set_of(&[0, 0]);
        let error = set
            .expand_endpoint(0, vec![bare("x")], &comparer)
            .unwrap_err();
        assert!(matches!(error, BuildError::DuplicateExpansionScore { .. }));
    }

    #[test]
    fn test_expand_endpoint_detects_invalidated_duplicates() {
        let comparer = EndpointComparer::new(&[]);
        let mut set = set_of(&[0, 0]);
        // Invalidation preserves the magnitude, so the duplicate is still
        // detected.
        set.set_validity(1, false);
        assert!(set.expand_endpoint(0, vec![bare("x")], &comparer).is_err());
    }

    #[test]
    fn test_expand_endpoint_replaces_slot() {
        let comparer = EndpointComparer::new(&[]);
        let mut set = set_of(&[0, 1]);
        set.expand_endpoint(0, vec![bare("x"), bare("y")], &comparer)
            .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.score(0), 0);
        assert_eq!(set.score(1), 0);
        assert_eq!(set.score(2), 1);
    }
}
