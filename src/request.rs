//! Read-only view of an incoming request.
//!
//! The matcher has no HTTP server of its own; callers build a
//! [`RequestContext`] from whatever request type their server exposes. Only
//! the fields the matching pipeline reads are carried: path, method,
//! headers, host, and scheme.

use http::header::HOST;
use http::{HeaderMap, Method};

/// Per-request input to the matcher.
///
/// Exclusively owned by one request's execution; never shared across
/// requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request path, starting with `/` (no query string)
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Request headers (multi-valued)
    pub headers: HeaderMap,
    /// Authority the request was addressed to (`host` or `host:port`);
    /// populated from the `Host` header when not set explicitly
    pub host: Option<String>,
    /// URI scheme, used to infer default ports for host matching
    pub scheme: String,
}

impl RequestContext {
    /// Create a request context for `method` and `path`.
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            path: path.to_string(),
            method,
            headers: HeaderMap::new(),
            host: None,
            scheme: "http".to_string(),
        }
    }

    /// Shorthand for a GET request.
    #[must_use]
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Set a header, appending to any existing values.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.append(name, value);
        }
        self
    }

    /// Set the authority explicitly.
    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Set the scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// The authority for host matching: the explicit host if set, otherwise
    /// the `Host` header.
    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        if let Some(host) = &self.host {
            return Some(host.as_str());
        }
        self.headers.get(HOST).and_then(|v| v.to_str().ok())
    }

    /// First value of `name`, as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of `name`, in order, as strings.
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.headers.get_all(name).iter().filter_map(|v| v.to_str().ok())
    }
}
