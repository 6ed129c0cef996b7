//! Endpoint data source and live matcher publication.
//!
//! Tree construction runs once per topology change on whichever thread
//! triggered it, producing a wholly immutable [`DfaMatcher`]. Publication
//! to request threads goes through an `ArcSwap`: readers load the current
//! matcher without locking, a single rebuild mutex serializes writers. If a
//! rebuild fails the previous matcher stays active and the error is
//! logged - the service keeps serving.

use crate::config::MatcherConfig;
use crate::endpoint::Endpoint;
use crate::matcher::{DfaMatcher, DfaMatcherBuilder};
use crate::policy::MatcherPolicy;
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{error, info};

type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// A mutable snapshot of registered endpoints with change notification.
///
/// The matcher treats the endpoint list as a snapshot to rebuild from
/// whenever notified of change; the data source owns the list.
#[derive(Default)]
pub struct EndpointDataSource {
    endpoints: RwLock<Vec<Arc<Endpoint>>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl EndpointDataSource {
    /// Create a data source over an initial endpoint list.
    #[must_use]
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints.into_iter().map(Arc::new).collect()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot the current endpoints.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Replace the endpoint list and notify listeners.
    pub fn update(&self, endpoints: impl IntoIterator<Item = Endpoint>) {
        if let Ok(mut current) = self.endpoints.write() {
            *current = endpoints.into_iter().map(Arc::new).collect();
        }
        self.notify();
    }

    /// Register a change listener.
    pub fn on_change(&self, listener: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(Box::new(listener));
        }
    }

    fn notify(&self) {
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener();
            }
        }
    }
}

impl std::fmt::Debug for EndpointDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.endpoints.read().map(|e| e.len()).unwrap_or(0);
        f.debug_struct("EndpointDataSource")
            .field("endpoints", &count)
            .finish()
    }
}

/// Always-current matcher handle.
///
/// Request threads call [`load`](Self::load) for a lock-free reference to
/// the latest matcher; data-source changes rebuild behind a single-writer
/// mutex and swap the new matcher in atomically.
pub struct MatcherHandle {
    current: ArcSwap<DfaMatcher>,
    rebuild_lock: Mutex<()>,
    data_source: Arc<EndpointDataSource>,
    policies: Vec<Arc<dyn MatcherPolicy>>,
    config: MatcherConfig,
}

impl MatcherHandle {
    /// Build the initial matcher and subscribe to data-source changes.
    pub fn new(
        data_source: Arc<EndpointDataSource>,
        policies: Vec<Arc<dyn MatcherPolicy>>,
        config: MatcherConfig,
    ) -> Result<Arc<Self>, crate::error::BuildError> {
        let initial = Self::build_matcher(&data_source, &policies, &config)?;
        let handle = Arc::new(Self {
            current: ArcSwap::from_pointee(initial),
            rebuild_lock: Mutex::new(()),
            data_source: Arc::clone(&data_source),
            policies,
            config,
        });

        let weak: Weak<Self> = Arc::downgrade(&handle);
        data_source.on_change(move || {
            if let Some(handle) = weak.upgrade() {
                handle.rebuild();
            }
        });

        Ok(handle)
    }

    /// The latest matcher. Lock-free; safe to call on every request.
    #[must_use]
    pub fn load(&self) -> Arc<DfaMatcher> {
        self.current.load_full()
    }

    /// Rebuild from the current data-source snapshot and publish.
    ///
    /// On failure the previous matcher stays active.
    pub fn rebuild(&self) {
        let Ok(_guard) = self.rebuild_lock.lock() else {
            return;
        };
        match Self::build_matcher(&self.data_source, &self.policies, &self.config) {
            Ok(matcher) => {
                info!(
                    states = matcher.state_count(),
                    "matcher rebuilt after endpoint change"
                );
                self.current.store(Arc::new(matcher));
            }
            Err(e) => {
                error!(error = %e, "matcher rebuild failed; previous routing table stays active");
            }
        }
    }

    fn build_matcher(
        data_source: &EndpointDataSource,
        policies: &[Arc<dyn MatcherPolicy>],
        config: &MatcherConfig,
    ) -> Result<DfaMatcher, crate::error::BuildError> {
        let mut builder =
            DfaMatcherBuilder::new(policies.to_vec()).with_config(config.clone());
        for endpoint in data_source.endpoints() {
            builder.add_shared_endpoint(endpoint);
        }
        builder.build()
    }
}

impl std::fmt::Debug for MatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherHandle")
            .field("data_source", &self.data_source)
            .finish()
    }
}
