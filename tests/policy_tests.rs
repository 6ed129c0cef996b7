mod common;

use common::{matcher_with_default_policies, route};
use dfamatch::{
    AcceptsMetadata, ContentEncodingMetadata, ContentEncodingPolicy, DfaMatcherBuilder,
    DynamicEndpointMetadata, Endpoint, HeaderMatchMetadata, HeaderPolicy, HostMetadata,
    HttpMethodMetadata, MatcherPolicy, RejectionMetadata, RequestContext,
};
use http::Method;
use std::sync::Arc;

fn rejection_status(matched: &dfamatch::RouteMatch) -> Option<u16> {
    matched
        .endpoint
        .metadata
        .get::<RejectionMetadata>()
        .map(|m| m.status)
}

#[test]
fn test_method_selects_by_verb() {
    let matcher = matcher_with_default_policies(vec![
        route("get_x", "/x").with_metadata(HttpMethodMetadata::new([Method::GET])),
        route("post_x", "/x").with_metadata(HttpMethodMetadata::new([Method::POST])),
    ]);

    let matched = matcher
        .match_request(&RequestContext::new(Method::GET, "/x"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "get_x");

    let matched = matcher
        .match_request(&RequestContext::new(Method::POST, "/x"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "post_x");
}

#[test]
fn test_405_synthesis_with_allow_header() {
    let matcher = matcher_with_default_policies(vec![
        route("get_x", "/x").with_metadata(HttpMethodMetadata::new([Method::GET])),
        route("post_x", "/x").with_metadata(HttpMethodMetadata::new([Method::POST])),
    ]);

    let matched = matcher
        .match_request(&RequestContext::new(Method::DELETE, "/x"))
        .unwrap()
        .unwrap();
    let rejection = matched.endpoint.metadata.get::<RejectionMetadata>().unwrap();
    assert_eq!(rejection.status, 405);
    assert_eq!(rejection.allow.as_deref(), Some("GET, POST"));
}

#[test]
fn test_no_405_when_an_endpoint_accepts_any_method() {
    let matcher = matcher_with_default_policies(vec![
        route("get_x", "/x").with_metadata(HttpMethodMetadata::new([Method::GET])),
        route("any_x", "/x"),
    ]);

    let matched = matcher
        .match_request(&RequestContext::new(Method::DELETE, "/x"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "any_x");

    // The more specific method endpoint still wins for its own verb.
    let matched = matcher
        .match_request(&RequestContext::new(Method::GET, "/x"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "get_x");
}

#[test]
fn test_cors_preflight_matches_requested_method() {
    let matcher = matcher_with_default_policies(vec![
        route("put_x", "/x")
            .with_metadata(HttpMethodMetadata::new([Method::PUT]).with_cors_preflight()),
        route("get_x", "/x").with_metadata(HttpMethodMetadata::new([Method::GET])),
    ]);

    // Preflight for PUT reaches the CORS-accepting endpoint.
    let preflight = RequestContext::new(Method::OPTIONS, "/x")
        .with_header("origin", "https://spa.example.com")
        .with_header("access-control-request-method", "PUT");
    let matched = matcher.match_request(&preflight).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "put_x");

    // The CORS-accepting endpoint still serves plain PUT requests.
    let matched = matcher
        .match_request(&RequestContext::new(Method::PUT, "/x"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "put_x");
}

#[test]
fn test_415_synthesis() {
    let matcher = matcher_with_default_policies(vec![
        route("ingest", "/ingest").with_metadata(AcceptsMetadata::new(["application/json"])),
    ]);

    let request = RequestContext::new(Method::POST, "/ingest")
        .with_header("content-type", "text/plain");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(rejection_status(&matched), Some(415));

    let request = RequestContext::new(Method::POST, "/ingest")
        .with_header("content-type", "application/json");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "ingest");
    assert_eq!(rejection_status(&matched), None);
}

#[test]
fn test_wildcard_accepts_endpoint_prevents_415() {
    // The unrestricted endpoint implicitly accepts */*; its presence means
    // no 415 edge is ever synthesized.
    let matcher = matcher_with_default_policies(vec![
        route("json", "/ingest").with_metadata(AcceptsMetadata::new(["application/json"])),
        route("any", "/ingest"),
    ]);

    let request = RequestContext::new(Method::POST, "/ingest")
        .with_header("content-type", "text/csv");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "any");

    let request = RequestContext::new(Method::POST, "/ingest")
        .with_header("content-type", "application/json");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "json");
}

#[test]
fn test_type_wildcard_subset_matching() {
    let matcher = matcher_with_default_policies(vec![
        route("text", "/upload").with_metadata(AcceptsMetadata::new(["text/*"])),
    ]);

    let request = RequestContext::new(Method::POST, "/upload")
        .with_header("content-type", "text/markdown; charset=utf-8");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "text");
}

#[test]
fn test_exact_host_matching() {
    let matcher = matcher_with_default_policies(vec![
        route("api", "/ping").with_metadata(HostMetadata::new(["api.example.com"])),
        route("fallback", "/ping"),
    ]);

    let matched = matcher
        .match_request(&RequestContext::get("/ping").with_host("api.example.com"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "api");

    let matched = matcher
        .match_request(&RequestContext::get("/ping").with_host("other.net"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "fallback");
}

#[test]
fn test_wildcard_host_matching() {
    let matcher = matcher_with_default_policies(vec![
        route("tenant", "/ping").with_metadata(HostMetadata::new(["*.example.com"])),
        route("fallback", "/ping"),
    ]);

    let matched = matcher
        .match_request(&RequestContext::get("/ping").with_host("www.example.com"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "tenant");

    // The wildcard is a strict suffix match: the apex does not qualify.
    let matched = matcher
        .match_request(&RequestContext::get("/ping").with_host("example.com"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "fallback");
}

#[test]
fn test_host_restricted_endpoint_does_not_match_other_hosts() {
    let matcher = matcher_with_default_policies(vec![
        route("api", "/ping").with_metadata(HostMetadata::new(["api.example.com"]))
    ]);

    assert!(matcher
        .match_request(&RequestContext::get("/ping").with_host("other.net"))
        .unwrap()
        .is_none());
}

#[test]
fn test_host_port_restriction() {
    let matcher = matcher_with_default_policies(vec![
        route("admin", "/ping").with_metadata(HostMetadata::new(["*:8080"])),
        route("open", "/ping"),
    ]);

    let matched = matcher
        .match_request(&RequestContext::get("/ping").with_host("example.com:8080"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "admin");

    let matched = matcher
        .match_request(&RequestContext::get("/ping").with_host("example.com"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "open");
}

fn negotiation_matcher(endpoints: Vec<Endpoint>) -> dfamatch::DfaMatcher {
    let mut policies = dfamatch::policy::default_policies();
    policies.push(Arc::new(ContentEncodingPolicy::default()) as Arc<dyn MatcherPolicy>);
    let mut builder = DfaMatcherBuilder::new(policies);
    for endpoint in endpoints {
        builder.add_endpoint(endpoint);
    }
    builder.build().unwrap()
}

#[test]
fn test_negotiation_prefers_higher_header_quality() {
    let matcher = negotiation_matcher(vec![
        route("gzip", "/asset").with_metadata(ContentEncodingMetadata::new("gzip", 1.0)),
        route("br", "/asset").with_metadata(ContentEncodingMetadata::new("br", 1.0)),
    ]);

    let request = RequestContext::get("/asset").with_header("accept-encoding", "br;q=0.9, gzip");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "gzip");

    let request = RequestContext::get("/asset").with_header("accept-encoding", "br, gzip;q=0.5");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "br");
}

#[test]
fn test_negotiation_server_quality_breaks_ties() {
    let matcher = negotiation_matcher(vec![
        route("gzip", "/asset").with_metadata(ContentEncodingMetadata::new("gzip", 0.5)),
        route("br", "/asset").with_metadata(ContentEncodingMetadata::new("br", 0.9)),
    ]);

    let request = RequestContext::get("/asset").with_header("accept-encoding", "gzip, br");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "br");
}

#[test]
fn test_negotiation_406_synthesis() {
    let matcher = negotiation_matcher(vec![
        route("gzip", "/asset").with_metadata(ContentEncodingMetadata::new("gzip", 1.0)),
        route("br", "/asset").with_metadata(ContentEncodingMetadata::new("br", 1.0)),
    ]);

    let request = RequestContext::get("/asset").with_header("accept-encoding", "deflate");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(rejection_status(&matched), Some(406));
}

#[test]
fn test_negotiation_implicit_default_survives_without_explicit_match() {
    let matcher = negotiation_matcher(vec![
        route("gzip", "/asset").with_metadata(ContentEncodingMetadata::new("gzip", 1.0)),
        route("plain", "/asset"),
    ]);

    // The plain variant implicitly offers identity; an explicit identity
    // request must pick it and drop the unmatched gzip variant.
    let request = RequestContext::get("/asset").with_header("accept-encoding", "identity");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "plain");

    // No header at all: negotiation stands down, the higher-priority
    // (metadata-carrying) variant wins.
    let matched = matcher
        .match_request(&RequestContext::get("/asset"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "gzip");
}

#[test]
fn test_dynamic_endpoints_use_request_time_method_filtering() {
    // Dynamic endpoints bypass tree-time policy branching entirely; the
    // request-time pass must mirror it, including 405 synthesis.
    let matcher = matcher_with_default_policies(vec![route("dyn_get", "/d")
        .with_metadata(DynamicEndpointMetadata)
        .with_metadata(HttpMethodMetadata::new([Method::GET]))]);

    let matched = matcher
        .match_request(&RequestContext::new(Method::GET, "/d"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "dyn_get");

    let matched = matcher
        .match_request(&RequestContext::new(Method::POST, "/d"))
        .unwrap()
        .unwrap();
    let rejection = matched.endpoint.metadata.get::<RejectionMetadata>().unwrap();
    assert_eq!(rejection.status, 405);
    assert_eq!(rejection.allow.as_deref(), Some("GET"));
}

#[test]
fn test_header_policy_filters_candidates() {
    let mut policies = dfamatch::policy::default_policies();
    policies.push(Arc::new(HeaderPolicy::default()) as Arc<dyn MatcherPolicy>);
    let mut builder = DfaMatcherBuilder::new(policies);
    builder.add_endpoint(
        route("v2", "/api").with_metadata(HeaderMatchMetadata::exact("x-version", ["2"])),
    );
    builder.add_endpoint(route("v1", "/api"));
    let matcher = builder.build().unwrap();

    let matched = matcher
        .match_request(&RequestContext::get("/api").with_header("x-version", "2"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "v2");

    let matched = matcher
        .match_request(&RequestContext::get("/api"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "v1");
}

#[test]
fn test_method_and_content_type_policies_compose() {
    let matcher = matcher_with_default_policies(vec![
        route("create", "/items")
            .with_metadata(HttpMethodMetadata::new([Method::POST]))
            .with_metadata(AcceptsMetadata::new(["application/json"])),
        route("list", "/items").with_metadata(HttpMethodMetadata::new([Method::GET])),
    ]);

    let request = RequestContext::new(Method::POST, "/items")
        .with_header("content-type", "application/json");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "create");

    let request = RequestContext::new(Method::POST, "/items")
        .with_header("content-type", "text/plain");
    let matched = matcher.match_request(&request).unwrap().unwrap();
    assert_eq!(rejection_status(&matched), Some(415));

    let matched = matcher
        .match_request(&RequestContext::new(Method::PATCH, "/items"))
        .unwrap()
        .unwrap();
    assert_eq!(rejection_status(&matched), Some(405));
}
