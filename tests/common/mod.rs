#![allow(dead_code)]

use dfamatch::{DfaMatcher, DfaMatcherBuilder, Endpoint, RoutePattern};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize test tracing once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A route endpoint whose handler and display name are the handler name.
pub fn route(handler: &str, template: &str) -> Endpoint {
    Endpoint::route(
        handler,
        RoutePattern::parse(template).expect("test template parses"),
    )
    .with_display_name(handler)
}

/// Build a matcher over plain route endpoints with no policies.
pub fn matcher_of(routes: &[(&str, &str)]) -> DfaMatcher {
    let mut builder = DfaMatcherBuilder::new(Vec::new());
    for (handler, template) in routes {
        builder.add_endpoint(route(handler, template));
    }
    builder.build().expect("matcher builds")
}

/// Build a matcher with the default policy set.
pub fn matcher_with_default_policies(endpoints: Vec<Endpoint>) -> DfaMatcher {
    let mut builder = DfaMatcherBuilder::with_default_policies();
    for endpoint in endpoints {
        builder.add_endpoint(endpoint);
    }
    builder.build().expect("matcher builds")
}
