//! Metrics sink
//!
//! Cluster handles own `IntGauge` value holders and register them here once,
//! on first write. The sink remembers each gauge's tags so everything bound to
//! a cluster identity can be unregistered in one call.

use crate::error::MonitorError;
use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Tag binding a metric to its cluster identity
pub const IDENTITY_TAG: &str = "API";

/// Nodes reported by the cluster
pub const NODE_COUNT: &str = "cluster.node.count";
/// Nodes whose `Ready` condition is true
pub const READY_NODE_COUNT: &str = "cluster.ready.node.count";
/// Web console answered with HTTP 200
pub const ACCESSIBLE: &str = "cluster.accessible";
/// Synthetic deploy check succeeded
pub const WORKING: &str = "cluster.working";

/// Exported name of a dotted metric name (`cluster.working` -> `cluster_working`)
pub fn exported_name(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

/// Gauge registry shared by every cluster handle.
pub trait MetricsSink: Send + Sync {
    /// Create a gauge tagged with `tags` and register it.
    fn register_gauge(&self, name: &str, tags: &[(String, String)]) -> Result<IntGauge, MonitorError>;

    /// Unregister every gauge carrying `key=value`; returns how many were removed.
    fn remove_tagged(&self, key: &str, value: &str) -> usize;

    /// Render all registered gauges in the Prometheus text format.
    fn encode(&self) -> Result<String, MonitorError>;
}

struct Registered {
    name: String,
    tags: Vec<(String, String)>,
    gauge: IntGauge,
}

/// [`MetricsSink`] backed by a `prometheus::Registry`.
pub struct PrometheusSink {
    registry: Registry,
    gauges: Mutex<Vec<Registered>>,
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusSink").finish_non_exhaustive()
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusSink {
    /// Sink over a fresh registry
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            gauges: Mutex::new(Vec::new()),
        }
    }

    /// Names and tags of the currently registered gauges
    pub fn registered(&self) -> Vec<(String, Vec<(String, String)>)> {
        match self.gauges.lock() {
            Ok(gauges) => gauges.iter().map(|r| (r.name.clone(), r.tags.clone())).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl MetricsSink for PrometheusSink {
    fn register_gauge(&self, name: &str, tags: &[(String, String)]) -> Result<IntGauge, MonitorError> {
        let mut opts = Opts::new(exported_name(name), format!("{} gauge", name));
        for (key, value) in tags {
            opts = opts.const_label(key.as_str(), value.as_str());
        }
        let gauge = IntGauge::with_opts(opts)?;

        let mut gauges = self
            .gauges
            .lock()
            .map_err(|_| MonitorError::Server("metrics sink lock poisoned".to_string()))?;
        if let Err(e) = self.registry.register(Box::new(gauge.clone())) {
            warn!("Gauge {} {:?} not exported: {}", name, tags, e);
            return Err(e.into());
        }
        gauges.push(Registered {
            name: name.to_string(),
            tags: tags.to_vec(),
            gauge: gauge.clone(),
        });
        debug!("Registered gauge {} {:?}", name, tags);

        Ok(gauge)
    }

    fn remove_tagged(&self, key: &str, value: &str) -> usize {
        let Ok(mut gauges) = self.gauges.lock() else {
            return 0;
        };

        let before = gauges.len();
        gauges.retain(|registered| {
            let tagged = registered.tags.iter().any(|(k, v)| k == key && v == value);
            if tagged {
                if let Err(e) = self.registry.unregister(Box::new(registered.gauge.clone())) {
                    warn!("Failed to unregister gauge {}: {}", registered.name, e);
                }
            }
            !tagged
        });

        let removed = before - gauges.len();
        debug!("Removed {} gauges tagged {}={}", removed, key, value);
        removed
    }

    fn encode(&self) -> Result<String, MonitorError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MonitorError::Server(format!("metrics are not UTF-8: {}", e)))
    }
}
