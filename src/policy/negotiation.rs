//! Header-negotiation policies.
//!
//! A generic base for quality-negotiated headers in the `Accept-Encoding`
//! family: the request header lists acceptable values with optional
//! qualities, each endpoint offers one value (or implicitly offers the
//! scheme's default), and the best (header quality, then server-declared
//! quality) offer wins. Candidates beaten by a strictly better match are
//! invalidated; if nothing matches and every candidate declared an offer, a
//! 406 rejection endpoint is synthesized.
//!
//! [`ContentEncodingPolicy`] is the concrete instantiation for
//! `Accept-Encoding` / `identity`.

use super::{EndpointComparerPolicy, EndpointSelectorPolicy, MatcherPolicy};
use crate::candidate::CandidateSet;
use crate::endpoint::{contains_dynamic_endpoints, Endpoint, RejectionMetadata};
use crate::request::RequestContext;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Handler name carried by the synthesized 406 endpoint.
pub const NOT_ACCEPTABLE_HANDLER: &str = "http_not_acceptable";

/// One negotiation scheme: which header, which default, and how endpoints
/// declare their offer.
pub trait NegotiationScheme: fmt::Debug + Send + Sync + 'static {
    /// Request header to negotiate on, e.g. `accept-encoding`.
    fn header_name(&self) -> &str;

    /// Value endpoints implicitly offer when they carry no metadata, e.g.
    /// `identity`.
    fn default_value(&self) -> &str;

    /// The endpoint's declared offer `(value, server_quality)`, if any.
    fn endpoint_offer(&self, endpoint: &Endpoint) -> Option<(String, f64)>;
}

/// One entry of the parsed request header.
#[derive(Debug, Clone, PartialEq)]
struct HeaderEntry {
    value: String,
    quality: f64,
}

/// Parse `gzip, br;q=0.8, *;q=0.1` preserving order; `q=0` entries are
/// explicit refusals and are kept so they can veto offers.
fn parse_negotiation_header(raw: &str) -> Vec<HeaderEntry> {
    raw.split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let value = pieces.next()?.trim().to_ascii_lowercase();
            if value.is_empty() {
                return None;
            }
            let mut quality = 1.0f64;
            for parameter in pieces {
                if let Some((name, q)) = parameter.split_once('=') {
                    if name.trim().eq_ignore_ascii_case("q") {
                        quality = q.trim().parse().unwrap_or(1.0);
                    }
                }
            }
            Some(HeaderEntry { value, quality })
        })
        .collect()
}

/// How one candidate's offer relates to the request header.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Offer {
    /// Matched a header entry: (header quality, server quality)
    Explicit(f64, f64),
    /// No metadata; implicitly offers the default value
    ImplicitDefault,
    /// Declared an offer the header does not accept
    NoMatch,
}

/// Generic negotiation policy over a [`NegotiationScheme`].
#[derive(Debug)]
pub struct NegotiationPolicy<S: NegotiationScheme> {
    scheme: S,
    order: i32,
}

impl<S: NegotiationScheme> NegotiationPolicy<S> {
    /// Wrap a scheme with the given policy order.
    #[must_use]
    pub fn new(scheme: S, order: i32) -> Self {
        Self { scheme, order }
    }

    fn classify(&self, endpoint: &Endpoint, entries: &[HeaderEntry]) -> Offer {
        let (value, server_quality, implicit) = match self.scheme.endpoint_offer(endpoint) {
            Some((value, quality)) => (value.to_ascii_lowercase(), quality, false),
            None => (self.scheme.default_value().to_ascii_lowercase(), 1.0, true),
        };

        let entry = entries
            .iter()
            .find(|e| e.value == value)
            .or_else(|| entries.iter().find(|e| e.value == "*"));

        match entry {
            Some(entry) if entry.quality > 0.0 => Offer::Explicit(entry.quality, server_quality),
            Some(_) => Offer::NoMatch, // q=0: explicitly refused
            None if implicit => Offer::ImplicitDefault,
            None => Offer::NoMatch,
        }
    }

    fn create_rejection_endpoint() -> Arc<Endpoint> {
        Arc::new(
            Endpoint::bare(NOT_ACCEPTABLE_HANDLER, "406 HTTP Not Acceptable").with_metadata(
                RejectionMetadata {
                    status: 406,
                    allow: None,
                },
            ),
        )
    }
}

impl<S: NegotiationScheme> MatcherPolicy for NegotiationPolicy<S> {
    fn order(&self) -> i32 {
        self.order
    }

    fn comparer(&self) -> Option<&dyn EndpointComparerPolicy> {
        Some(self)
    }

    fn endpoint_selector(&self) -> Option<&dyn EndpointSelectorPolicy> {
        Some(self)
    }
}

impl<S: NegotiationScheme> EndpointComparerPolicy for NegotiationPolicy<S> {
    fn compare_endpoints(&self, a: &Endpoint, b: &Endpoint) -> Ordering {
        let a_offers = self.scheme.endpoint_offer(a).is_some();
        let b_offers = self.scheme.endpoint_offer(b).is_some();
        match (a_offers, b_offers) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}

impl<S: NegotiationScheme> EndpointSelectorPolicy for NegotiationPolicy<S> {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        contains_dynamic_endpoints(endpoints)
            || endpoints
                .iter()
                .any(|e| self.scheme.endpoint_offer(e).is_some())
    }

    fn apply(
        &self,
        request: &RequestContext,
        candidates: &mut CandidateSet,
    ) -> Option<Arc<Endpoint>> {
        // Header values are iterated in request order by collecting them
        // into one entry list; absence of the header means no preference
        // and the policy stands down.
        let mut entries: Vec<HeaderEntry> = Vec::new();
        for raw in request.header_values(self.scheme.header_name()) {
            entries.extend(parse_negotiation_header(raw));
        }
        if entries.is_empty() {
            return None;
        }

        let mut best: Option<(f64, f64)> = None;
        let mut accepted: Vec<usize> = Vec::new();
        let mut unmatched: Vec<usize> = Vec::new();
        let mut has_default_free_match = false;
        let mut any_match = false;

        for index in 0..candidates.len() {
            if !candidates.is_valid(index) {
                continue;
            }
            match self.classify(candidates.endpoint(index), &entries) {
                Offer::Explicit(header_quality, server_quality) => {
                    any_match = true;
                    has_default_free_match = true;
                    let quality = (header_quality, server_quality);
                    match best {
                        None => {
                            // Anything accepted so far was an implicit
                            // default; an explicit match beats it.
                            for &beaten in &accepted {
                                candidates.set_validity(beaten, false);
                            }
                            accepted.clear();
                            best = Some(quality);
                            accepted.push(index);
                        }
                        Some(current)
                            if quality.0 > current.0
                                || (quality.0 == current.0 && quality.1 > current.1) =>
                        {
                            // Strictly better: everything accepted so far
                            // loses.
                            for &beaten in &accepted {
                                candidates.set_validity(beaten, false);
                            }
                            accepted.clear();
                            accepted.push(index);
                            best = Some(quality);
                        }
                        Some(current)
                            if quality.0 == current.0 && quality.1 == current.1 =>
                        {
                            accepted.push(index);
                        }
                        Some(_) => {
                            candidates.set_validity(index, false);
                        }
                    }
                }
                Offer::ImplicitDefault => {
                    any_match = true;
                    if has_default_free_match {
                        candidates.set_validity(index, false);
                    } else {
                        accepted.push(index);
                    }
                }
                Offer::NoMatch => {
                    unmatched.push(index);
                }
            }
        }

        // Candidates that failed to match lose only once a default-free
        // match exists; otherwise they stay, and lower scores decide.
        if has_default_free_match {
            for &index in &unmatched {
                candidates.set_validity(index, false);
            }
        }

        if !any_match && !unmatched.is_empty() {
            return Some(Self::create_rejection_endpoint());
        }
        None
    }
}

/// Declares the content encoding an endpoint produces.
#[derive(Debug, Clone)]
pub struct ContentEncodingMetadata {
    /// Encoding name, e.g. `gzip`, `br`
    pub encoding: String,
    /// Server-side preference used to break header-quality ties
    pub quality: f64,
}

impl ContentEncodingMetadata {
    /// Metadata for `encoding` with the given server quality.
    #[must_use]
    pub fn new(encoding: impl Into<String>, quality: f64) -> Self {
        Self {
            encoding: encoding.into(),
            quality,
        }
    }
}

/// `Accept-Encoding` scheme: the implicit default is `identity`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentEncodingScheme;

impl NegotiationScheme for ContentEncodingScheme {
    fn header_name(&self) -> &str {
        "accept-encoding"
    }

    fn default_value(&self) -> &str {
        "identity"
    }

    fn endpoint_offer(&self, endpoint: &Endpoint) -> Option<(String, f64)> {
        endpoint
            .metadata
            .get::<ContentEncodingMetadata>()
            .map(|m| (m.encoding.clone(), m.quality))
    }
}

/// Negotiates response encoding variants by `Accept-Encoding`.
pub type ContentEncodingPolicy = NegotiationPolicy<ContentEncodingScheme>;

impl Default for ContentEncodingPolicy {
    fn default() -> Self {
        NegotiationPolicy::new(ContentEncodingScheme, -50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_qualities() {
        let entries = parse_negotiation_header("gzip, br;q=0.8, *;q=0.1");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].value, "gzip");
        assert!((entries[0].quality - 1.0).abs() < f64::EPSILON);
        assert_eq!(entries[1].value, "br");
        assert!((entries[1].quality - 0.8).abs() < f64::EPSILON);
        assert_eq!(entries[2].value, "*");
    }

    #[test]
    fn test_classify_wildcard_and_refusal() {
        let policy = ContentEncodingPolicy::default();
        let gzip = Endpoint::bare("h", "gzip")
            .with_metadata(ContentEncodingMetadata::new("gzip", 1.0));

        let entries = parse_negotiation_header("*;q=0.5");
        assert_eq!(policy.classify(&gzip, &entries), Offer::Explicit(0.5, 1.0));

        let entries = parse_negotiation_header("gzip;q=0");
        assert_eq!(policy.classify(&gzip, &entries), Offer::NoMatch);
    }

    #[test]
    fn test_classify_implicit_default() {
        let policy = ContentEncodingPolicy::default();
        let plain = Endpoint::bare("h", "plain");

        let entries = parse_negotiation_header("identity");
        assert_eq!(policy.classify(&plain, &entries), Offer::Explicit(1.0, 1.0));

        let entries = parse_negotiation_header("gzip");
        assert_eq!(policy.classify(&plain, &entries), Offer::ImplicitDefault);
    }
}
