//! HTTP method policy.
//!
//! Branches the tree by request method, synthesizes the 405 rejection
//! endpoint, and understands CORS preflight: a preflight request (OPTIONS +
//! `Origin` + `Access-Control-Request-Method`) is matched against the
//! *requested* method through dedicated preflight edges, and only against
//! endpoints that opted into preflight handling.

use super::{
    compare_metadata_presence, EndpointComparerPolicy, EndpointSelectorPolicy, MatcherPolicy,
    NodeBuilderPolicy, PolicyEdgeKey, PolicyJumpTable, PolicyJumpTableEdge, PolicyNodeEdge,
};
use crate::candidate::CandidateSet;
use crate::endpoint::{contains_dynamic_endpoints, Endpoint, RejectionMetadata};
use http::Method;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Declares which HTTP methods an endpoint accepts.
///
/// An endpoint without this metadata (or with an empty method list) accepts
/// any method.
#[derive(Debug, Clone)]
pub struct HttpMethodMetadata {
    /// Accepted methods; empty means any
    pub methods: Vec<Method>,
    /// Whether the endpoint handles CORS preflight requests itself
    pub accepts_cors_preflight: bool,
}

impl HttpMethodMetadata {
    /// Metadata accepting `methods` without CORS preflight handling.
    #[must_use]
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            accepts_cors_preflight: false,
        }
    }

    /// Also accept CORS preflight requests.
    #[must_use]
    pub fn with_cors_preflight(mut self) -> Self {
        self.accepts_cors_preflight = true;
        self
    }
}

/// Handler name carried by the synthesized 405 endpoint.
pub const METHOD_NOT_ALLOWED_HANDLER: &str = "http_method_not_allowed";

/// Edge key: a concrete method plus the preflight flag, or the any-method
/// sentinel (`method: None`). The any-method/non-preflight edge doubles as
/// the "no match" exit and carries the 405 endpoint when no real endpoint
/// accepts arbitrary methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpMethodEdgeKey {
    /// `None` is the any-method sentinel
    pub method: Option<Method>,
    /// Whether this edge serves CORS preflight matching
    pub cors_preflight: bool,
}

/// The policy. Runs first among the built-ins.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpMethodPolicy;

impl HttpMethodPolicy {
    fn metadata(endpoint: &Endpoint) -> Option<&HttpMethodMetadata> {
        endpoint
            .metadata
            .get::<HttpMethodMetadata>()
            .filter(|m| !m.methods.is_empty())
    }

    fn create_rejection_endpoint(methods: &[Method]) -> Arc<Endpoint> {
        let mut names: Vec<&str> = methods.iter().map(Method::as_str).collect();
        names.sort_by(|a, b| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()));
        names.dedup();
        let allow = names.join(", ");
        Arc::new(
            Endpoint::bare(METHOD_NOT_ALLOWED_HANDLER, "405 HTTP Method Not Supported")
                .with_metadata(RejectionMetadata {
                    status: 405,
                    allow: Some(allow),
                }),
        )
    }
}

/// Preflight detection: OPTIONS with both CORS request headers present.
/// Returns the method that matching should run against.
fn effective_method(request: &crate::request::RequestContext) -> (Method, bool) {
    if request.method == Method::OPTIONS
        && request.header("origin").is_some()
    {
        if let Some(requested) = request.header("access-control-request-method") {
            if let Ok(method) = Method::from_bytes(requested.as_bytes()) {
                return (method, true);
            }
        }
    }
    (request.method.clone(), false)
}

impl MatcherPolicy for HttpMethodPolicy {
    fn order(&self) -> i32 {
        -1000
    }

    fn comparer(&self) -> Option<&dyn EndpointComparerPolicy> {
        Some(self)
    }

    fn node_builder(&self) -> Option<&dyn NodeBuilderPolicy> {
        Some(self)
    }

    fn endpoint_selector(&self) -> Option<&dyn EndpointSelectorPolicy> {
        Some(self)
    }
}

impl EndpointComparerPolicy for HttpMethodPolicy {
    fn compare_endpoints(&self, a: &Endpoint, b: &Endpoint) -> Ordering {
        compare_metadata_presence::<HttpMethodMetadata>(a, b)
    }
}

impl NodeBuilderPolicy for HttpMethodPolicy {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        if contains_dynamic_endpoints(endpoints) {
            return false;
        }
        endpoints.iter().any(|e| Self::metadata(e).is_some())
    }

    fn get_edges(&self, endpoints: &[Arc<Endpoint>]) -> Vec<PolicyNodeEdge> {
        // Discover the key set first, in first-seen order.
        let mut keys: Vec<HttpMethodEdgeKey> = Vec::new();
        let mut push_key = |keys: &mut Vec<HttpMethodEdgeKey>, key: HttpMethodEdgeKey| {
            if !keys.contains(&key) {
                keys.push(key);
            }
        };
        let mut all_methods: Vec<Method> = Vec::new();
        let mut has_any_method_endpoint = false;

        for endpoint in endpoints {
            match Self::metadata(endpoint) {
                Some(metadata) => {
                    for method in &metadata.methods {
                        if !all_methods.contains(method) {
                            all_methods.push(method.clone());
                        }
                        push_key(
                            &mut keys,
                            HttpMethodEdgeKey {
                                method: Some(method.clone()),
                                cors_preflight: false,
                            },
                        );
                        if metadata.accepts_cors_preflight {
                            push_key(
                                &mut keys,
                                HttpMethodEdgeKey {
                                    method: Some(method.clone()),
                                    cors_preflight: true,
                                },
                            );
                        }
                    }
                }
                None => {
                    has_any_method_endpoint = true;
                    push_key(
                        &mut keys,
                        HttpMethodEdgeKey {
                            method: None,
                            cors_preflight: false,
                        },
                    );
                }
            }
        }

        let accepts = |endpoint: &Arc<Endpoint>, key: &HttpMethodEdgeKey| -> bool {
            match Self::metadata(endpoint) {
                // Method-agnostic endpoints match every non-preflight edge.
                None => !key.cors_preflight,
                Some(metadata) => match &key.method {
                    Some(method) => {
                        metadata.methods.contains(method)
                            && (!key.cors_preflight || metadata.accepts_cors_preflight)
                    }
                    None => false,
                },
            }
        };

        let mut edges: Vec<PolicyNodeEdge> = keys
            .into_iter()
            .map(|key| {
                let members: Vec<Arc<Endpoint>> = endpoints
                    .iter()
                    .filter(|e| accepts(e, &key))
                    .map(Arc::clone)
                    .collect();
                PolicyNodeEdge {
                    key: PolicyEdgeKey::new(key),
                    endpoints: members,
                }
            })
            .collect();

        // Without an any-method edge, an unlisted method would fall off the
        // tree and 404; the correct answer is 405 with the allowed set.
        if !has_any_method_endpoint {
            edges.push(PolicyNodeEdge {
                key: PolicyEdgeKey::new(HttpMethodEdgeKey {
                    method: None,
                    cors_preflight: false,
                }),
                endpoints: vec![Self::create_rejection_endpoint(&all_methods)],
            });
        }

        edges
    }

    fn build_jump_table(
        &self,
        exit_destination: usize,
        edges: &[PolicyJumpTableEdge],
    ) -> Arc<dyn PolicyJumpTable> {
        let mut destinations: HashMap<Method, usize> = HashMap::new();
        let mut cors_destinations: HashMap<Method, usize> = HashMap::new();
        let mut any_destination = None;
        let mut cors_any_destination = None;

        for edge in edges {
            let Some(key) = edge.key.downcast_ref::<HttpMethodEdgeKey>() else {
                continue;
            };
            match (&key.method, key.cors_preflight) {
                (Some(method), false) => {
                    destinations.insert(method.clone(), edge.destination);
                }
                (Some(method), true) => {
                    cors_destinations.insert(method.clone(), edge.destination);
                }
                (None, false) => any_destination = Some(edge.destination),
                (None, true) => cors_any_destination = Some(edge.destination),
            }
        }

        Arc::new(HttpMethodPolicyJumpTable {
            exit_destination,
            destinations,
            cors_destinations,
            any_destination,
            cors_any_destination,
        })
    }
}

impl EndpointSelectorPolicy for HttpMethodPolicy {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        // Static sets were already filtered through the tree; only dynamic
        // endpoint sets need the request-time pass.
        contains_dynamic_endpoints(endpoints)
    }

    fn apply(
        &self,
        request: &crate::request::RequestContext,
        candidates: &mut CandidateSet,
    ) -> Option<Arc<Endpoint>> {
        let (method, preflight) = effective_method(request);

        // 405 is warranted only when every candidate declared methods and
        // none matched, so invalid candidates are still scanned: this
        // mirrors the tree-time edge construction exactly.
        let mut needs_405 = true;
        let mut allowed: Vec<Method> = Vec::new();

        for index in 0..candidates.len() {
            match Self::metadata(candidates.endpoint(index)) {
                None => {
                    needs_405 = false;
                }
                Some(metadata) => {
                    for m in &metadata.methods {
                        if !allowed.contains(m) {
                            allowed.push(m.clone());
                        }
                    }
                    let matched = metadata.methods.contains(&method)
                        && (!preflight || metadata.accepts_cors_preflight);
                    if matched {
                        needs_405 = false;
                    } else if candidates.is_valid(index) {
                        candidates.set_validity(index, false);
                    }
                }
            }
        }

        if needs_405 && !allowed.is_empty() {
            return Some(Self::create_rejection_endpoint(&allowed));
        }
        None
    }
}

#[derive(Debug)]
struct HttpMethodPolicyJumpTable {
    exit_destination: usize,
    destinations: HashMap<Method, usize>,
    cors_destinations: HashMap<Method, usize>,
    any_destination: Option<usize>,
    cors_any_destination: Option<usize>,
}

impl PolicyJumpTable for HttpMethodPolicyJumpTable {
    fn get_destination(&self, request: &crate::request::RequestContext) -> usize {
        let (method, preflight) = effective_method(request);
        if preflight {
            return self
                .cors_destinations
                .get(&method)
                .copied()
                .or(self.cors_any_destination)
                .or(self.any_destination)
                .unwrap_or(self.exit_destination);
        }
        self.destinations
            .get(&method)
            .copied()
            .or(self.any_destination)
            .unwrap_or(self.exit_destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestContext;

    fn endpoint_with(methods: &[Method]) -> Arc<Endpoint> {
        Arc::new(
            Endpoint::bare("h", "e").with_metadata(HttpMethodMetadata::new(methods.to_vec())),
        )
    }

    #[test]
    fn test_get_edges_synthesizes_405() {
        let endpoints = vec![endpoint_with(&[Method::GET]), endpoint_with(&[Method::POST])];
        let edges = HttpMethodPolicy.get_edges(&endpoints);

        // GET, POST, and the synthesized any-method edge.
        assert_eq!(edges.len(), 3);
        let rejection = &edges[2].endpoints[0];
        let metadata = rejection.metadata.get::<RejectionMetadata>().unwrap();
        assert_eq!(metadata.status, 405);
        assert_eq!(metadata.allow.as_deref(), Some("GET, POST"));
    }

    #[test]
    fn test_get_edges_no_rejection_when_any_method_endpoint_exists() {
        let endpoints = vec![endpoint_with(&[Method::GET]), Arc::new(Endpoint::bare("h", "any"))];
        let edges = HttpMethodPolicy.get_edges(&endpoints);

        // GET edge + any edge; the any-method endpoint also joins the GET
        // edge.
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].endpoints.len(), 2);
        assert_eq!(edges[1].endpoints.len(), 1);
        assert!(edges[1].endpoints[0]
            .metadata
            .get::<RejectionMetadata>()
            .is_none());
    }

    #[test]
    fn test_preflight_detection() {
        let plain = RequestContext::new(Method::OPTIONS, "/x");
        assert!(!effective_method(&plain).1);

        let preflight = RequestContext::new(Method::OPTIONS, "/x")
            .with_header("origin", "https://example.com")
            .with_header("access-control-request-method", "DELETE");
        let (method, is_preflight) = effective_method(&preflight);
        assert!(is_preflight);
        assert_eq!(method, Method::DELETE);
    }

    #[test]
    fn test_cors_endpoints_are_duplicated_into_plain_edges() {
        let cors = Arc::new(Endpoint::bare("h", "cors").with_metadata(
            HttpMethodMetadata::new([Method::PUT]).with_cors_preflight(),
        ));
        let edges = HttpMethodPolicy.get_edges(&vec![Arc::clone(&cors)]);

        let plain = edges
            .iter()
            .find(|e| {
                e.key
                    .downcast_ref::<HttpMethodEdgeKey>()
                    .is_some_and(|k| !k.cors_preflight && k.method == Some(Method::PUT))
            })
            .unwrap();
        let preflight = edges
            .iter()
            .find(|e| {
                e.key
                    .downcast_ref::<HttpMethodEdgeKey>()
                    .is_some_and(|k| k.cors_preflight && k.method == Some(Method::PUT))
            })
            .unwrap();
        assert_eq!(plain.endpoints.len(), 1);
        assert_eq!(preflight.endpoints.len(), 1);
    }
}
