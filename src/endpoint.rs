//! Endpoint model: a routable target the matcher can select.
//!
//! An endpoint is an opaque handler name plus an ordered metadata collection,
//! a display name, and (for route endpoints) a parsed route pattern. The
//! matcher never invokes handlers; it only reads endpoints and records the
//! selected one.

use crate::pattern::RoutePattern;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An ordered, heterogeneous collection of endpoint metadata.
///
/// Policies attach their configuration to endpoints as typed metadata
/// entries (HTTP methods, host patterns, accepted content types). Lookup is
/// by type, last entry wins, so later registrations override earlier ones
/// while the full ordered list remains inspectable.
#[derive(Clone, Default)]
pub struct MetadataCollection {
    entries: Vec<Arc<dyn Any + Send + Sync>>,
}

impl MetadataCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a metadata entry.
    pub fn push<T: Any + Send + Sync>(&mut self, metadata: T) {
        self.entries.push(Arc::new(metadata));
    }

    /// Get the most recently added entry of type `T`, if any.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .iter()
            .rev()
            .find_map(|entry| entry.downcast_ref::<T>())
    }

    /// Whether any entry of type `T` is present.
    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MetadataCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCollection")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Marker metadata for endpoints produced by a dynamic endpoint source.
///
/// Dynamic endpoints bypass the static tree, so node-builder policies must
/// not precompute branches for them; the corresponding endpoint-selector
/// policies re-run the same filtering at request time instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEndpointMetadata;

/// Metadata carried by synthetic rejection endpoints (405/415/406).
///
/// The handler of a rejection endpoint is expected to write `status` and,
/// when present, the `Allow` header. Selecting a rejection endpoint is a
/// normal selection outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionMetadata {
    /// HTTP status the rejection handler writes (405, 415, or 406)
    pub status: u16,
    /// Value for the `Allow` response header (405 only)
    pub allow: Option<String>,
}

/// A routable target: opaque handler reference plus metadata.
///
/// Endpoints are immutable once constructed and owned by the application;
/// the matcher only reads them. Route endpoints carry a parsed
/// [`RoutePattern`]; non-route endpoints (e.g. rejection endpoints) do not
/// and always sort after route endpoints.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Name of the handler that should process requests matched to this
    /// endpoint. Opaque to the matcher; the dispatcher resolves it.
    pub handler_name: Arc<str>,
    /// Human-readable name used in diagnostics and ambiguity reports
    pub display_name: String,
    /// Ordered metadata collection
    pub metadata: MetadataCollection,
    /// Parsed route pattern; `None` for non-route endpoints
    pub pattern: Option<Arc<RoutePattern>>,
    /// Relative order among endpoints; lower sorts first
    pub order: i32,
}

impl Endpoint {
    /// Create a route endpoint from a parsed pattern.
    ///
    /// The display name defaults to the raw template text.
    #[must_use]
    pub fn route(handler_name: &str, pattern: RoutePattern) -> Self {
        Self {
            handler_name: Arc::from(handler_name),
            display_name: pattern.raw_text().to_string(),
            metadata: MetadataCollection::new(),
            pattern: Some(Arc::new(pattern)),
            order: 0,
        }
    }

    /// Create a non-route endpoint (no pattern, sorts after all route
    /// endpoints).
    #[must_use]
    pub fn bare(handler_name: &str, display_name: &str) -> Self {
        Self {
            handler_name: Arc::from(handler_name),
            display_name: display_name.to_string(),
            metadata: MetadataCollection::new(),
            pattern: None,
            order: 0,
        }
    }

    /// Set the relative order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    /// Append a metadata entry.
    #[must_use]
    pub fn with_metadata<T: Any + Send + Sync>(mut self, metadata: T) -> Self {
        self.metadata.push(metadata);
        self
    }

    /// Whether this endpoint came from a dynamic endpoint source.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.metadata.contains::<DynamicEndpointMetadata>()
    }

    /// Raw route template text, if this is a route endpoint.
    #[must_use]
    pub fn template_text(&self) -> Option<&str> {
        self.pattern.as_deref().map(RoutePattern::raw_text)
    }
}

/// Whether any endpoint in the slice is dynamic.
///
/// Node-builder policies use this to bail out of tree-time branching;
/// endpoint-selector policies use it to know they must apply
/// unconditionally.
#[must_use]
pub fn contains_dynamic_endpoints(endpoints: &[Arc<Endpoint>]) -> bool {
    endpoints.iter().any(|e| e.is_dynamic())
}
