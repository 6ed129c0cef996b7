//! Host policy.
//!
//! Branches the tree by the request authority. Host patterns support exact
//! hosts, `*.suffix` wildcards, and port restrictions: `www.example.com:8080`,
//! `*.example.com`, `*:5000`, `*`. Wildcard host matching is a suffix
//! comparison against everything after the leading `*`.

use super::{
    compare_metadata_presence, EndpointComparerPolicy, EndpointSelectorPolicy, MatcherPolicy,
    NodeBuilderPolicy, PolicyEdgeKey, PolicyJumpTable, PolicyJumpTableEdge, PolicyNodeEdge,
};
use crate::candidate::CandidateSet;
use crate::endpoint::{contains_dynamic_endpoints, Endpoint};
use crate::request::RequestContext;
use std::cmp::Ordering;
use std::sync::Arc;

/// Restricts an endpoint to one or more host patterns.
#[derive(Debug, Clone)]
pub struct HostMetadata {
    /// Accepted host patterns; empty means any host
    pub hosts: Vec<String>,
}

impl HostMetadata {
    /// Metadata accepting the given patterns.
    #[must_use]
    pub fn new(hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }
}

/// A parsed host pattern, usable as an edge key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostEdgeKey {
    /// Lowercased host; `None` matches any host. With `wildcard_suffix`
    /// set, this is the `.suffix` after the leading `*`.
    pub host: Option<String>,
    /// Whether `host` is a wildcard suffix
    pub wildcard_suffix: bool,
    /// Port restriction; `None` matches any port
    pub port: Option<u16>,
}

impl HostEdgeKey {
    /// The unrestricted key (`*`), used for endpoints without host
    /// metadata.
    #[must_use]
    pub fn any() -> Self {
        Self {
            host: None,
            wildcard_suffix: false,
            port: None,
        }
    }

    /// Parse a pattern like `www.example.com:8080` or `*.example.com`.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let (host_part, port_part) = match pattern.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port != "*" => {
                (host, port.parse::<u16>().ok())
            }
            Some((host, _)) => (host, None),
            None => (pattern, None),
        };

        let host_part = host_part.to_ascii_lowercase();
        if host_part.is_empty() || host_part == "*" {
            Self {
                host: None,
                wildcard_suffix: false,
                port: port_part,
            }
        } else if let Some(suffix) = host_part.strip_prefix('*') {
            Self {
                host: Some(suffix.to_string()),
                wildcard_suffix: true,
                port: port_part,
            }
        } else {
            Self {
                host: Some(host_part),
                wildcard_suffix: false,
                port: port_part,
            }
        }
    }

    /// Jump-table ordering: lower scores are checked first.
    ///
    /// exact host+port < exact host < wildcard host+port < wildcard host <
    /// port only < unrestricted.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        match (&self.host, self.wildcard_suffix, self.port) {
            (Some(_), false, Some(_)) => 1,
            (Some(_), false, None) => 2,
            (Some(_), true, Some(_)) => 3,
            (Some(_), true, None) => 4,
            (None, _, Some(_)) => 5,
            (None, _, None) => 6,
        }
    }

    /// Whether a concrete request authority satisfies this pattern.
    #[must_use]
    pub fn matches(&self, host: &str, port: Option<u16>) -> bool {
        if let Some(pattern_host) = &self.host {
            let matched = if self.wildcard_suffix {
                host.len() > pattern_host.len() && host.ends_with(pattern_host.as_str())
            } else {
                host == pattern_host
            };
            if !matched {
                return false;
            }
        }
        match self.port {
            None => true,
            Some(pattern_port) => port == Some(pattern_port),
        }
    }

    /// Whether every authority matched by `edge` is also matched by
    /// `self`. Used to place endpoints on all edges they remain valid for.
    #[must_use]
    pub fn subsumes(&self, edge: &HostEdgeKey) -> bool {
        let host_ok = match (&self.host, &edge.host) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(own), Some(other)) => {
                if self.wildcard_suffix {
                    if edge.wildcard_suffix {
                        other.ends_with(own.as_str())
                    } else {
                        other.len() > own.len() && other.ends_with(own.as_str())
                    }
                } else {
                    !edge.wildcard_suffix && own == other
                }
            }
        };
        if !host_ok {
            return false;
        }
        match (self.port, edge.port) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(own), Some(other)) => own == other,
        }
    }
}

/// Parse a request authority into `(host, port)`, defaulting the port from
/// the scheme.
fn parse_authority(request: &RequestContext) -> Option<(String, Option<u16>)> {
    let authority = request.authority()?;
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
            (host, port.parse::<u16>().ok())
        }
        _ => (authority, None),
    };
    let port = port.or(match request.scheme.as_str() {
        "https" => Some(443),
        "http" => Some(80),
        _ => None,
    });
    Some((host.to_ascii_lowercase(), port))
}

/// The policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPolicy;

impl HostPolicy {
    fn endpoint_keys(endpoint: &Endpoint) -> Vec<HostEdgeKey> {
        match endpoint.metadata.get::<HostMetadata>() {
            Some(metadata) if !metadata.hosts.is_empty() => metadata
                .hosts
                .iter()
                .map(|pattern| HostEdgeKey::parse(pattern))
                .collect(),
            _ => vec![HostEdgeKey::any()],
        }
    }
}

impl MatcherPolicy for HostPolicy {
    fn order(&self) -> i32 {
        -100
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

impl EndpointComparerPolicy for HostPolicy {
    fn compare_endpoints(&self, a: &Endpoint, b: &Endpoint) -> Ordering {
        compare_metadata_presence::<HostMetadata>(a, b)
    }
}

impl NodeBuilderPolicy for HostPolicy {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        if contains_dynamic_endpoints(endpoints) {
            return false;
        }
        endpoints
            .iter()
            .any(|e| e.metadata.get::<HostMetadata>().is_some_and(|m| !m.hosts.is_empty()))
    }

    fn get_edges(&self, endpoints: &[Arc<Endpoint>]) -> Vec<PolicyNodeEdge> {
        // Distinct keys in first-seen order; an endpoint joins every edge
        // one of its own patterns subsumes.
        let mut keys: Vec<HostEdgeKey> = Vec::new();
        for endpoint in endpoints {
            for key in Self::endpoint_keys(endpoint) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        keys.into_iter()
            .map(|key| {
                let members: Vec<Arc<Endpoint>> = endpoints
                    .iter()
                    .filter(|endpoint| {
                        Self::endpoint_keys(endpoint)
                            .iter()
                            .any(|own| own.subsumes(&key))
                    })
                    .map(Arc::clone)
                    .collect();
                PolicyNodeEdge {
                    key: PolicyEdgeKey::new(key),
                    endpoints: members,
                }
            })
            .collect()
    }

    fn build_jump_table(
        &self,
        exit_destination: usize,
        edges: &[PolicyJumpTableEdge],
    ) -> Arc<dyn PolicyJumpTable> {
        let mut entries: Vec<(HostEdgeKey, usize)> = edges
            .iter()
            .filter_map(|edge| {
                edge.key
                    .downcast_ref::<HostEdgeKey>()
                    .map(|key| (key.clone(), edge.destination))
            })
            .collect();
        // Specific keys are checked before generic ones; the stable sort
        // keeps edge order within a specificity class.
        entries.sort_by_key(|(key, _)| key.specificity());
        Arc::new(HostPolicyJumpTable {
            exit_destination,
            entries,
        })
    }
}

impl EndpointSelectorPolicy for HostPolicy {
    fn applies_to_endpoints(&self, endpoints: &[Arc<Endpoint>]) -> bool {
        contains_dynamic_endpoints(endpoints)
    }

    fn apply(
        &self,
        request: &RequestContext,
        candidates: &mut CandidateSet,
    ) -> Option<Arc<Endpoint>> {
        let authority = parse_authority(request);
        for index in 0..candidates.len() {
            if !candidates.is_valid(index) {
                continue;
            }
            let endpoint = candidates.endpoint(index);
            let Some(metadata) = endpoint.metadata.get::<HostMetadata>() else {
                continue;
            };
            if metadata.hosts.is_empty() {
                continue;
            }
            let matched = authority.as_ref().is_some_and(|(host, port)| {
                metadata
                    .hosts
                    .iter()
                    .any(|pattern| HostEdgeKey::parse(pattern).matches(host, *port))
            });
            if !matched {
                candidates.set_validity(index, false);
            }
        }
        // An unmatched host is a plain 404, never a rejection.
        None
    }
}

#[derive(Debug)]
struct HostPolicyJumpTable {
    exit_destination: usize,
    entries: Vec<(HostEdgeKey, usize)>,
}

impl PolicyJumpTable for HostPolicyJumpTable {
    fn get_destination(&self, request: &RequestContext) -> usize {
        let Some((host, port)) = parse_authority(request) else {
            // No authority at all: only an unrestricted edge can match.
            return self
                .entries
                .iter()
                .find(|(key, _)| key.host.is_none() && key.port.is_none())
                .map_or(self.exit_destination, |(_, destination)| *destination);
        };
        for (key, destination) in &self.entries {
            if key.matches(&host, port) {
                return *destination;
            }
        }
        self.exit_destination
    }
}
