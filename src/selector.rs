//! Endpoint selection and ambiguity resolution.

use crate::candidate::CandidateSet;
use crate::error::MatchError;
use crate::matcher::RouteMatch;
use crate::request::RequestContext;
use std::fmt;
use std::sync::Arc;

/// Consumes the filtered candidate set and picks the winning endpoint.
///
/// Implementations may assume the set is ordered ascending by score; the
/// matcher establishes that invariant at build time and never reorders at
/// request time (policies only toggle validity).
pub trait EndpointSelector: fmt::Debug + Send + Sync {
    /// Select an endpoint, or nothing (the caller treats that as
    /// not-found).
    fn select(
        &self,
        request: &RequestContext,
        candidates: CandidateSet,
    ) -> Result<Option<RouteMatch>, MatchError>;
}

/// Default selector: lowest-score valid candidate wins; an equal-score tie
/// between valid candidates is an ambiguous-match failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEndpointSelector;

impl EndpointSelector for DefaultEndpointSelector {
    fn select(
        &self,
        _request: &RequestContext,
        candidates: CandidateSet,
    ) -> Result<Option<RouteMatch>, MatchError> {
        let mut best: Option<usize> = None;

        for index in 0..candidates.len() {
            if !candidates.is_valid(index) {
                continue;
            }
            let Some(best_index) = best else {
                best = Some(index);
                continue;
            };
            let best_score = candidates.score(best_index);
            let score = candidates.score(index);
            if score > best_score {
                // Candidates are score-ordered: everything after this one
                // is lower priority by construction.
                break;
            }
            if score == best_score {
                return Err(ambiguity(&candidates));
            }
        }

        Ok(best.map(|index| RouteMatch {
            endpoint: Arc::clone(candidates.endpoint(index)),
            values: candidates.values(index).clone(),
        }))
    }
}

fn ambiguity(candidates: &CandidateSet) -> MatchError {
    let display_names = (0..candidates.len())
        .filter(|&index| candidates.is_valid(index))
        .map(|index| candidates.endpoint(index).display_name.clone())
        .collect();
    MatchError::AmbiguousMatch { display_names }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateState;
    use crate::endpoint::Endpoint;
    use crate::values::RouteValues;

    fn set_of(names_scores: &[(&str, i32)]) -> CandidateSet {
        CandidateSet::new(names_scores.iter().map(|(name, score)| {
            CandidateState::new(
                Arc::new(Endpoint::bare(name, name)),
                RouteValues::new(),
                *score,
            )
        }))
    }

    fn select(set: CandidateSet) -> Result<Option<RouteMatch>, MatchError> {
        DefaultEndpointSelector.select(&RequestContext::get("/"), set)
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        assert!(select(set_of(&[])).unwrap().is_none());
    }

    #[test]
    fn test_single_valid_candidate() {
        let selected = select(set_of(&[("a", 0)])).unwrap().unwrap();
        assert_eq!(selected.endpoint.display_name, "a");
    }

    #[test]
    fn test_single_invalid_candidate() {
        let mut set = set_of(&[("a", 0)]);
        set.set_validity(0, false);
        assert!(select(set).unwrap().is_none());
    }

    #[test]
    fn test_lowest_score_wins() {
        let selected = select(set_of(&[("a", 0), ("b", 1)])).unwrap().unwrap();
        assert_eq!(selected.endpoint.display_name, "a");
    }

    #[test]
    fn test_tie_is_ambiguous_and_lists_valid_names() {
        let error = select(set_of(&[("a", 0), ("b", 0)])).unwrap_err();
        assert_eq!(
            error,
            MatchError::AmbiguousMatch {
                display_names: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn test_invalidating_one_side_resolves_the_tie() {
        let mut set = set_of(&[("a", 0), ("b", 0)]);
        set.set_validity(0, false);
        let selected = select(set).unwrap().unwrap();
        assert_eq!(selected.endpoint.display_name, "b");
    }

    #[test]
    fn test_later_higher_score_does_not_trip_ambiguity() {
        let selected = select(set_of(&[("a", 0), ("b", 1), ("c", 1)]))
            .unwrap()
            .unwrap();
        assert_eq!(selected.endpoint.display_name, "a");
    }
}
