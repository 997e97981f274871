//! Cluster handle
//!
//! One monitored cluster: its control-plane connection and the gauges
//! published for it. Closing a handle is terminal.

use crate::metrics::{IDENTITY_TAG, MetricsSink, exported_name};
use ocp_client::ControlPlane;
use prometheus::IntGauge;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Default)]
struct HandleState {
    metrics: HashMap<String, IntGauge>,
    closed: bool,
}

/// One tracked cluster and the gauges published for it
pub struct ClusterHandle {
    identity: String,
    client: Arc<dyn ControlPlane>,
    sink: Arc<dyn MetricsSink>,
    state: Mutex<HandleState>,
}

impl std::fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterHandle")
            .field("identity", &self.identity)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ClusterHandle {
    /// The identity is the control plane's API URL.
    pub fn new(client: Arc<dyn ControlPlane>, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            identity: client.api_url().to_string(),
            client,
            sink,
            state: Mutex::new(HandleState::default()),
        }
    }

    /// API URL the gauges are tagged with
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Control-plane connection
    pub fn client(&self) -> &dyn ControlPlane {
        self.client.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create or update a gauge. Tags are fixed by the first write.
    ///
    /// Silently does nothing once the handle is closed.
    pub fn set_metric(&self, name: &str, value: i64, extra_tags: &[(&str, &str)]) {
        let mut state = self.lock();
        if state.closed {
            debug!("Ignoring {} on closed cluster {}", name, self.identity);
            return;
        }

        if let Some(gauge) = state.metrics.get(name) {
            gauge.set(value);
            return;
        }

        let mut tags = vec![(IDENTITY_TAG.to_string(), self.identity.clone())];
        tags.extend(extra_tags.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let registered = self.sink.register_gauge(name, &tags).or_else(|e| {
            // Keep the value readable through the handle even if export failed.
            warn!("Metric {} for {} is tracked locally only: {}", name, self.identity, e);
            IntGauge::new(exported_name(name), name)
        });
        let gauge = match registered {
            Ok(gauge) => gauge,
            Err(e) => {
                warn!("Dropping metric {} for {}: {}", name, self.identity, e);
                return;
            }
        };
        gauge.set(value);
        state.metrics.insert(name.to_string(), gauge);
    }

    /// Boolean gauge, written as 1/0
    pub fn set_flag(&self, name: &str, value: bool) {
        self.set_metric(name, i64::from(value), &[]);
    }

    /// Whether a gauge was ever written
    pub fn has_metric(&self, name: &str) -> bool {
        self.lock().metrics.contains_key(name)
    }

    /// Current value of a gauge, if it was ever written
    pub fn get_metric(&self, name: &str) -> Option<i64> {
        self.lock().metrics.get(name).map(IntGauge::get)
    }

    /// Mark the handle closed and drop all of its gauges from the sink.
    ///
    /// Both happen under the handle lock, so a concurrent `set_metric` either
    /// lands before removal or is ignored.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let removed = self.sink.remove_tagged(IDENTITY_TAG, &self.identity);
        debug!("Closed cluster {}, removed {} metrics", self.identity, removed);
    }

    /// Whether [`Self::close`] was called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
