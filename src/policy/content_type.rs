//! Content-type ("accepts") policy.
//!
//! Branches the tree by the request's `Content-Type`. Endpoint metadata
//! declares the media types a handler consumes, with `type/*` and `*/*`
//! wildcards; matching is the subset relation between the request's media
//! type and each candidate pattern. When no endpoint accepts `*/*`, a 415
//! rejection endpoint rides the wildcard edge so unsupported media types
//! get the right status instead of a 404.

use super::{
    compare_metadata_presence, EndpointComparerPolicy, EndpointSelectorPolicy, MatcherPolicy,
    NodeBuilderPolicy, PolicyEdgeKey, PolicyJumpTable, PolicyJumpTableEdge, PolicyNodeEdge,
};
use crate::candidate::CandidateSet;
use crate::endpoint::{contains_dynamic_endpoints, Endpoint, RejectionMetadata};
use crate::request::RequestContext;
use std::cmp::Ordering;
use std::sync::Arc;

/// Declares the media types an endpoint consumes.
///
/// An endpoint without this metadata (or with an empty list) accepts
/// anything.
#[derive(Debug, Clone)]
pub struct AcceptsMetadata {
    /// Accepted media type patterns, e.g. `application/json`, `text/*`
    pub content_types: Vec<String>,
}

impl AcceptsMetadata {
    /// Metadata accepting the given media types.
    #[must_use]
    pub fn new(content_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            content_types: content_types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Handler name carried by the synthesized 415 endpoint.
pub const UNSUPPORTED_MEDIA_TYPE_HANDLER: &str = "http_unsupported_media_type";

/// A parsed `type/subtype` pattern; `None` components are wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    /// Main type, `None` for `*`
    pub main_type: Option<String>,
    /// Subtype, `None` for `*`
    pub sub_type: Option<String>,
}

impl MediaType {
    /// The `*/*` wildcard.
    #[must_use]
    pub fn any() -> Self {
        Self {
            main_type: None,
            sub_type: None,
        }
    }

    /// Parse `application/json`, `text/*`, `*/*`. Parameters (`; charset=`)
    /// are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let (main_type, sub_type) = match text.split_once('/') {
            Some((main, sub)) => (main.to_string(), sub.to_string()),
            None => (text, "*".to_string()),
        };
        Self {
            main_type: (main_type != "*").then_some(main_type),
            sub_type: (sub_type != "*").then_some(sub_type),
        }
    }

    /// Whether every media type matched by `self` is matched by `other`.
    ///
    /// A concrete request type is a subset of `text/*`, which is a subset
    /// of `*/*`.
    #[must_use]
    pub fn is_subset_of(&self, other: &MediaType) -> bool {
        let main_ok = match (&self.main_type, &other.main_type) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a == b,
        };
        if !main_ok {
            return false;
        }
        match (&self.sub_type, &other.sub_type) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a == b,
        }
    }

    /// Lower sorts first in the jump table: exact before `type/*` before
    /// `*/*`.
    fn specificity(&self) -> u8 {
        match (&self.main_type, &self.sub_type) {
            (Some(_), Some(_)) => 0,
            (Some(_), None) => 1,
            _ => 2,
        }
    }
}

/// The policy. Runs after the method policy, before host.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentTypePolicy;

impl ContentTypePolicy {
    fn metadata(endpoint: &Endpoint) -> Option<&AcceptsMetadata> {
        endpoint
            .metadata
            .get::<AcceptsMetadata>()
            .filter(|m| !m.content_types.is_empty())
    }

    fn endpoint_types(endpoint: &Endpoint) -> Vec<MediaType> {
        match Self::metadata(endpoint) {
            Some(metadata) => metadata.content_types.iter().map(|t| MediaType::parse(t)).collect(),
            None => vec![MediaType::any()],
        }
    }

    fn create_rejection_endpoint() -> Arc<Endpoint> {
        Arc::new(
            Endpoint::bare(UNSUPPORTED_MEDIA_TYPE_HANDLER, "415 HTTP Unsupported Media Type")
                .with_metadata(RejectionMetadata {
                    status: 415,
                    allow: None,
                }),
        )
    }
}

impl MatcherPolicy for ContentTypePolicy {
    fn order(&self) -> i32 {
        -200
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

impl EndpointComparerPolicy for ContentTypePolicy {
    fn compare_endpoints(&self, a: &Endpoint, b: &Endpoint) -> Ordering {
        compare_metadata_presence::<AcceptsMetadata>(a, b)
    }
}

impl NodeBuilderPolicy for ContentTypePolicy {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        if contains_dynamic_endpoints(endpoints) {
            return false;
        }
        endpoints.iter().any(|e| Self::metadata(e).is_some())
    }

    fn get_edges(&self, endpoints: &[Arc<Endpoint>]) -> Vec<PolicyNodeEdge> {
        let mut keys: Vec<MediaType> = Vec::new();
        for endpoint in endpoints {
            for media_type in Self::endpoint_types(endpoint) {
                if !keys.contains(&media_type) {
                    keys.push(media_type);
                }
            }
        }

        let mut edges: Vec<PolicyNodeEdge> = keys
            .into_iter()
            .map(|key| {
                let members: Vec<Arc<Endpoint>> = endpoints
                    .iter()
                    .filter(|endpoint| {
                        Self::endpoint_types(endpoint)
                            .iter()
                            .any(|own| key.is_subset_of(own))
                    })
                    .map(Arc::clone)
                    .collect();
                PolicyNodeEdge {
                    key: PolicyEdgeKey::new(key),
                    endpoints: members,
                }
            })
            .collect();

        // No endpoint accepts */*: requests with an unlisted content type
        // land on a synthesized 415 instead of falling off the tree.
        if !edges
            .iter()
            .any(|edge| edge.key.downcast_ref::<MediaType>() == Some(&MediaType::any()))
        {
            edges.push(PolicyNodeEdge {
                key: PolicyEdgeKey::new(MediaType::any()),
                endpoints: vec![Self::create_rejection_endpoint()],
            });
        }

        edges
    }

    fn build_jump_table(
        &self,
        exit_destination: usize,
        edges: &[PolicyJumpTableEdge],
    ) -> Arc<dyn PolicyJumpTable> {
        let mut entries: Vec<(MediaType, usize)> = edges
            .iter()
            .filter_map(|edge| {
                edge.key
                    .downcast_ref::<MediaType>()
                    .map(|key| (key.clone(), edge.destination))
            })
            .collect();
        entries.sort_by_key(|(key, _)| key.specificity());

        // A request without a Content-Type header has its own destination,
        // distinct from subset matching against the wildcard edge.
        let no_content_type_destination = entries
            .iter()
            .find(|(key, _)| *key == MediaType::any())
            .map_or(exit_destination, |(_, destination)| *destination);

        Arc::new(ContentTypePolicyJumpTable {
            exit_destination,
            no_content_type_destination,
            entries,
        })
    }
}

impl EndpointSelectorPolicy for ContentTypePolicy {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        contains_dynamic_endpoints(endpoints)
    }

    fn apply(
        &self,
        request: &RequestContext,
        candidates: &mut CandidateSet,
    ) -> Option<Arc<Endpoint>> {
        let request_type = request
            .header("content-type")
            .filter(|v| !v.is_empty())
            .map(MediaType::parse);

        let mut needs_415 = true;
        for index in 0..candidates.len() {
            match Self::metadata(candidates.endpoint(index)) {
                None => {
                    needs_415 = false;
                }
                Some(metadata) => {
                    let matched = match &request_type {
                        None => true,
                        Some(request_type) => metadata
                            .content_types
                            .iter()
                            .any(|t| request_type.is_subset_of(&MediaType::parse(t))),
                    };
                    if matched {
                        needs_415 = false;
                    } else if candidates.is_valid(index) {
                        candidates.set_validity(index, false);
                    }
                }
            }
        }

        if needs_415 && request_type.is_some() {
            return Some(Self::create_rejection_endpoint());
        }
        None
    }
}

#[derive(Debug)]
struct ContentTypePolicyJumpTable {
    exit_destination: usize,
    no_content_type_destination: usize,
    entries: Vec<(MediaType, usize)>,
}

impl PolicyJumpTable for ContentTypePolicyJumpTable {
    fn get_destination(&self, request: &RequestContext) -> usize {
        let Some(content_type) = request.header("content-type").filter(|v| !v.is_empty()) else {
            return self.no_content_type_destination;
        };
        let request_type = MediaType::parse(content_type);
        for (entry, destination) in &self.entries {
            if request_type.is_subset_of(entry) {
                return *destination;
            }
        }
        self.exit_destination
    }
}
