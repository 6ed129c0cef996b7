//! # dfamatch
//!
//! **dfamatch** is a high-performance URL endpoint matcher for Rust: given
//! an incoming HTTP request (path, method, headers, host) it selects
//! exactly one registered endpoint out of a large set of route templates,
//! using a precomputed DFA-like decision structure for speed, resolving
//! ambiguity deterministically, and supporting pluggable policies for
//! orthogonal concerns (HTTP method, host, content-type negotiation,
//! custom criteria).
//!
//! ## Overview
//!
//! The library has no HTTP server of its own; its boundary is purely
//! in-process. Callers register [`Endpoint`]s (an opaque handler name plus
//! metadata and a parsed [`RoutePattern`]), build a [`DfaMatcher`] once,
//! and then match [`RequestContext`]s against it on the request path. The
//! result is either a selected endpoint with extracted route values,
//! nothing (a 404 for the caller to produce), or a synthetic rejection
//! endpoint carrying a 405/415/406 status.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`pattern`]** - Route template model and parser (literals,
//!   parameters, defaults, catch-alls, complex segments, constraints)
//! - **[`tree`]** - Breadth-first trie construction over route templates
//!   and lowering into the immutable state array
//! - **[`jump_table`]** - Tiered segment-lookup structures chosen by entry
//!   count, including a background-compiled trie
//! - **[`policy`]** - Pluggable matcher policies: HTTP method (with CORS
//!   preflight and 405 synthesis), host, content type (415), content
//!   negotiation (406), header matching
//! - **[`candidate`]** - Precomputed per-endpoint match descriptions,
//!   dense priority scores, and the request-scoped candidate set
//! - **[`matcher`]** - The request-time engine: jump-table walk, value
//!   materialization, policy passes
//! - **[`selector`]** - Lowest-score selection and ambiguous-match
//!   reporting
//! - **[`constraint`]** - Parameter constraint contract and built-ins
//! - **[`data_source`]** - Endpoint snapshots with change notification and
//!   lock-free matcher republication
//!
//! ## Matching Flow
//!
//! Matching is a two-phase walk over an immutable state array:
//!
//! 1. **Path phase**: the request path is tokenized into zero-copy
//!    segment spans; each span steps through the current state's jump
//!    table. Literal edges win over parameter edges, which win over
//!    catch-alls; non-matching segments fall through to the parameter
//!    branch and zero-length segments take the exit transition.
//! 2. **Policy phase**: from the terminal state, policy jump tables
//!    (method, host, content type) route to the final state whose
//!    candidates were precomputed for exactly that request shape.
//!
//! Candidates are then materialized (defaults, captures, catch-all,
//! deferred complex segments, constraints), filtered by endpoint-selector
//! policies, and handed to the selector, which picks the lowest-score
//! valid candidate and reports ties as [`MatchError::AmbiguousMatch`].
//!
//! ## Quick Start
//!
//! ```
//! use dfamatch::{DfaMatcherBuilder, Endpoint, RequestContext, RoutePattern};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = DfaMatcherBuilder::with_default_policies();
//! builder.add_endpoint(Endpoint::route(
//!     "get_user_post",
//!     RoutePattern::parse("/users/{id}/posts/{postId=latest}")?,
//! ));
//! let matcher = builder.build()?;
//!
//! let request = RequestContext::get("/users/42/posts");
//! let matched = matcher.match_request(&request)?.expect("route matches");
//! assert_eq!(matched.endpoint.handler_name.as_ref(), "get_user_post");
//! assert_eq!(matched.values.get_str("id"), Some("42"));
//! assert_eq!(matched.values.get_str("postId"), Some("latest"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Tree construction runs once (or on each topology change) on a single
//! thread and produces wholly immutable structures; request threads share
//! them without locking. [`MatcherHandle`] publishes rebuilt matchers via
//! an atomic swap, and the background-compiled jump tables serve an
//! interpreted fallback until their one-time compilation finishes. All
//! per-request state is owned by that request's execution.

pub mod candidate;
pub mod comparer;
pub mod config;
pub mod constraint;
pub mod data_source;
pub mod endpoint;
pub mod error;
pub mod jump_table;
pub mod matcher;
pub mod pattern;
pub mod policy;
pub mod request;
pub mod segments;
pub mod selector;
pub mod tree;
pub mod values;

pub use candidate::{Candidate, CandidateFlags, CandidateSet};
pub use comparer::EndpointComparer;
pub use config::{JumpTableTuning, MatcherConfig};
pub use constraint::{ConstraintResolver, ParameterPolicyRef, RouteConstraint};
pub use data_source::{EndpointDataSource, MatcherHandle};
pub use endpoint::{DynamicEndpointMetadata, Endpoint, MetadataCollection, RejectionMetadata};
pub use error::{BuildError, MatchError};
pub use matcher::{DfaMatcher, DfaMatcherBuilder, RouteMatch};
pub use pattern::RoutePattern;
pub use policy::{
    content_type::{AcceptsMetadata, ContentTypePolicy},
    header::{HeaderMatchMetadata, HeaderMatchMode, HeaderPolicy},
    host::{HostMetadata, HostPolicy},
    http_method::{HttpMethodMetadata, HttpMethodPolicy},
    negotiation::{ContentEncodingMetadata, ContentEncodingPolicy, NegotiationPolicy, NegotiationScheme},
    MatcherPolicy,
};
pub use request::RequestContext;
pub use selector::{DefaultEndpointSelector, EndpointSelector};
pub use values::RouteValues;
