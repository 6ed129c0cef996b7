mod common;

use common::{init_tracing, matcher_of, route};
use dfamatch::{
    DfaMatcherBuilder, Endpoint, MatchError, RequestContext, RouteMatch, RoutePattern,
};
use http::Method;
use serde_json::json;

fn assert_handler(matched: &Option<RouteMatch>, handler: &str) {
    let matched = matched.as_ref().expect("a route should match");
    assert_eq!(matched.endpoint.handler_name.as_ref(), handler);
}

#[test]
fn test_literal_matching() {
    init_tracing();
    let matcher = matcher_of(&[
        ("root", "/"),
        ("health", "/health"),
        ("animals", "/zoo/animals"),
    ]);

    assert_handler(&matcher.match_request(&RequestContext::get("/")).unwrap(), "root");
    assert_handler(
        &matcher.match_request(&RequestContext::get("/health")).unwrap(),
        "health",
    );
    assert_handler(
        &matcher.match_request(&RequestContext::get("/zoo/animals")).unwrap(),
        "animals",
    );
    assert!(matcher
        .match_request(&RequestContext::get("/zoo"))
        .unwrap()
        .is_none());
    assert!(matcher
        .match_request(&RequestContext::get("/zoo/animals/extra"))
        .unwrap()
        .is_none());
}

#[test]
fn test_path_matching_is_case_insensitive() {
    let matcher = matcher_of(&[("animals", "/zoo/animals")]);
    assert_handler(
        &matcher.match_request(&RequestContext::get("/Zoo/ANIMALS")).unwrap(),
        "animals",
    );
}

#[test]
fn test_trailing_slash_matches() {
    let matcher = matcher_of(&[("animals", "/zoo/animals")]);
    assert_handler(
        &matcher.match_request(&RequestContext::get("/zoo/animals/")).unwrap(),
        "animals",
    );
}

#[test]
fn test_parameter_capture() {
    let matcher = matcher_of(&[("get_animal", "/zoo/animals/{id}")]);

    let matched = matcher
        .match_request(&RequestContext::get("/zoo/animals/123"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get_str("id"), Some("123"));
}

#[test]
fn test_literal_wins_over_parameter() {
    let matcher = matcher_of(&[("by_id", "/users/{id}"), ("me", "/users/me")]);

    assert_handler(&matcher.match_request(&RequestContext::get("/users/me")).unwrap(), "me");
    assert_handler(
        &matcher.match_request(&RequestContext::get("/users/42")).unwrap(),
        "by_id",
    );
}

#[test]
fn test_default_values_round_trip() {
    let matcher = matcher_of(&[("user_posts", "/users/{id}/posts/{postId=latest}")]);

    let matched = matcher
        .match_request(&RequestContext::get("/users/42/posts"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get_str("id"), Some("42"));
    assert_eq!(matched.values.get_str("postId"), Some("latest"));

    let matched = matcher
        .match_request(&RequestContext::get("/users/42/posts/7"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get_str("id"), Some("42"));
    assert_eq!(matched.values.get_str("postId"), Some("7"));
}

#[test]
fn test_optional_parameter() {
    let matcher = matcher_of(&[("files", "/files/{name?}")]);

    let matched = matcher
        .match_request(&RequestContext::get("/files"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get("name"), None);

    let matched = matcher
        .match_request(&RequestContext::get("/files/readme"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get_str("name"), Some("readme"));
}

#[test]
fn test_catch_all_matches_zero_segments() {
    let matcher = matcher_of(&[("files", "/files/{*path}")]);

    let matched = matcher
        .match_request(&RequestContext::get("/files"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "files");
    assert_eq!(matched.values.get("path"), None);
}

#[test]
fn test_catch_all_takes_remaining_path() {
    let matcher = matcher_of(&[("files", "/files/{*path}")]);

    let matched = matcher
        .match_request(&RequestContext::get("/files/a/b/c"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get_str("path"), Some("a/b/c"));
}

#[test]
fn test_sibling_literal_outranks_catch_all() {
    let matcher = matcher_of(&[("files", "/files/{*path}"), ("readme", "/files/readme")]);

    assert_handler(
        &matcher.match_request(&RequestContext::get("/files/readme")).unwrap(),
        "readme",
    );
    assert_handler(
        &matcher.match_request(&RequestContext::get("/files/other")).unwrap(),
        "files",
    );
    assert_handler(
        &matcher.match_request(&RequestContext::get("/files/readme/v2")).unwrap(),
        "files",
    );
}

#[test]
fn test_catch_all_default_value() {
    let mut builder = DfaMatcherBuilder::new(Vec::new());
    builder.add_endpoint(Endpoint::route(
        "files",
        RoutePattern::parse("/files/{*path}")
            .unwrap()
            .with_defaults([("path", json!("index.html"))]),
    ));
    let matcher = builder.build().unwrap();

    let matched = matcher
        .match_request(&RequestContext::get("/files"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get_str("path"), Some("index.html"));
}

#[test]
fn test_constraint_invalidates_candidate() {
    let matcher = matcher_of(&[("by_id", "/orders/{id:int}"), ("by_slug", "/orders/{slug}")]);

    assert_handler(
        &matcher.match_request(&RequestContext::get("/orders/42")).unwrap(),
        "by_id",
    );
    assert_handler(
        &matcher.match_request(&RequestContext::get("/orders/discounted")).unwrap(),
        "by_slug",
    );
}

#[test]
fn test_constraint_only_route_rejects_non_matching() {
    let matcher = matcher_of(&[("by_id", "/orders/{id:int}")]);
    assert!(matcher
        .match_request(&RequestContext::get("/orders/notanumber"))
        .unwrap()
        .is_none());
}

#[test]
fn test_complex_segment_matching() {
    let matcher = matcher_of(&[("range", "/report/{from}-{to}")]);

    let matched = matcher
        .match_request(&RequestContext::get("/report/2024-2025"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.values.get_str("from"), Some("2024"));
    assert_eq!(matched.values.get_str("to"), Some("2025"));

    assert!(matcher
        .match_request(&RequestContext::get("/report/2024"))
        .unwrap()
        .is_none());
}

#[test]
fn test_complex_segment_loses_to_literal() {
    let matcher = matcher_of(&[("range", "/report/{from}-{to}"), ("all", "/report/all")]);

    assert_handler(
        &matcher.match_request(&RequestContext::get("/report/all")).unwrap(),
        "all",
    );
    assert_handler(
        &matcher.match_request(&RequestContext::get("/report/a-b")).unwrap(),
        "range",
    );
}

#[test]
fn test_ambiguous_match_reports_all_tied_names() {
    let matcher = matcher_of(&[("first", "/a"), ("second", "/a")]);

    let error = matcher
        .match_request(&RequestContext::get("/a"))
        .unwrap_err();
    let MatchError::AmbiguousMatch { display_names } = error;
    assert_eq!(display_names, vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn test_order_resolves_would_be_ambiguity() {
    let mut builder = DfaMatcherBuilder::new(Vec::new());
    builder.add_endpoint(route("low", "/a").with_order(-1));
    builder.add_endpoint(route("high", "/a"));
    let matcher = builder.build().unwrap();

    assert_handler(&matcher.match_request(&RequestContext::get("/a")).unwrap(), "low");
}

#[test]
fn test_empty_interior_segment_only_matches_catch_all() {
    let matcher = matcher_of(&[("pair", "/a/{b}/c"), ("rest", "/x/{*rest}")]);

    // A zero-length segment cannot satisfy a regular parameter...
    assert!(matcher
        .match_request(&RequestContext::get("/a//c"))
        .unwrap()
        .is_none());

    // ...but a catch-all absorbs it.
    let matched = matcher
        .match_request(&RequestContext::get("/x//y"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.endpoint.handler_name.as_ref(), "rest");
}

#[test]
fn test_deeper_paths_than_any_template_do_not_match() {
    let matcher = matcher_of(&[("a", "/a"), ("ab", "/a/b")]);
    assert!(matcher
        .match_request(&RequestContext::get("/a/b/c/d/e/f/g"))
        .unwrap()
        .is_none());
}

#[test]
fn test_method_is_irrelevant_without_method_policy() {
    let matcher = matcher_of(&[("a", "/a")]);
    assert_handler(
        &matcher
            .match_request(&RequestContext::new(Method::DELETE, "/a"))
            .unwrap(),
        "a",
    );
}

#[test]
fn test_construction_is_idempotent() {
    // Two independently built matchers must agree on a corpus of requests.
    let routes: &[(&str, &str)] = &[
        ("root", "/"),
        ("users", "/users"),
        ("user", "/users/{id}"),
        ("user_posts", "/users/{id}/posts/{postId=latest}"),
        ("me", "/users/me"),
        ("orders_int", "/orders/{id:int}"),
        ("orders_slug", "/orders/{slug}"),
        ("files", "/files/{*path}"),
        ("readme", "/files/readme"),
        ("range", "/report/{from}-{to}"),
    ];
    let first = matcher_of(routes);
    let second = matcher_of(routes);

    let corpus = [
        "/",
        "/users",
        "/users/42",
        "/users/me",
        "/users/42/posts",
        "/users/42/posts/9",
        "/orders/7",
        "/orders/slug-like",
        "/files",
        "/files/readme",
        "/files/a/b",
        "/report/1-2",
        "/report/x",
        "/nothing/here",
    ];
    for path in corpus {
        let a = first.match_request(&RequestContext::get(path)).unwrap();
        let b = second.match_request(&RequestContext::get(path)).unwrap();
        assert_eq!(
            a.as_ref().map(|m| m.endpoint.handler_name.as_ref()),
            b.as_ref().map(|m| m.endpoint.handler_name.as_ref()),
            "matchers disagree on {path}"
        );
        assert_eq!(
            a.as_ref().map(|m| m.values.clone()),
            b.as_ref().map(|m| m.values.clone()),
            "route values disagree on {path}"
        );
    }
}
