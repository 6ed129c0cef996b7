//! Composite endpoint comparer.
//!
//! Priority order, ascending: declared `Order` (non-route endpoints always
//! sort last), route-pattern inbound precedence, then each registered
//! ordering-contributing policy in ascending policy order. For a strict
//! total order - used when sorting, never for equality grouping - ties fall
//! back to the raw route template text, case-insensitively.

use crate::endpoint::Endpoint;
use crate::policy::MatcherPolicy;
use std::cmp::Ordering;
use std::sync::Arc;

/// Composite comparer resolved once at matcher-build time.
#[derive(Debug, Clone, Default)]
pub struct EndpointComparer {
    /// Policies contributing a secondary comparison, ascending by policy
    /// order
    ordering_policies: Vec<Arc<dyn MatcherPolicy>>,
}

impl EndpointComparer {
    /// Resolve the ordering-capable policies out of `policies`.
    #[must_use]
    pub fn new(policies: &[Arc<dyn MatcherPolicy>]) -> Self {
        let mut ordering_policies: Vec<Arc<dyn MatcherPolicy>> = policies
            .iter()
            .filter(|p| p.comparer().is_some())
            .map(Arc::clone)
            .collect();
        ordering_policies.sort_by_key(|p| p.order());
        Self { ordering_policies }
    }

    /// Total-order comparison used for sorting endpoints.
    #[must_use]
    pub fn compare(&self, a: &Endpoint, b: &Endpoint) -> Ordering {
        self.compare_priority(a, b).then_with(|| {
            cmp_ignore_ascii_case(
                a.template_text().unwrap_or(""),
                b.template_text().unwrap_or(""),
            )
        })
    }

    /// Whether two endpoints tie in priority.
    ///
    /// Deliberately omits the template-text fallback: two distinct
    /// templates can share a priority, and that tie is what ambiguity
    /// detection keys off.
    #[must_use]
    pub fn equal_priority(&self, a: &Endpoint, b: &Endpoint) -> bool {
        self.compare_priority(a, b) == Ordering::Equal
    }

    fn compare_priority(&self, a: &Endpoint, b: &Endpoint) -> Ordering {
        // Non-route endpoints (no pattern) always sort last.
        let ordering = match (&a.pattern, &b.pattern) {
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(pa), Some(pb)) => a
                .order
                .cmp(&b.order)
                .then_with(|| pa.precedence().total_cmp(&pb.precedence())),
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }

        for policy in &self.ordering_policies {
            if let Some(comparer) = policy.comparer() {
                let ordering = comparer.compare_endpoints(a, b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
        Ordering::Equal
    }
}

fn cmp_ignore_ascii_case(a: &str, b: &str) -> Ordering {
    let mut a = a.bytes().map(|c| c.to_ascii_lowercase());
    let mut b = b.bytes().map(|c| c.to_ascii_lowercase());
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
}
