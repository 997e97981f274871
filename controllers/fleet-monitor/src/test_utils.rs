//! Test utilities
//!
//! Builders for kubeconfig documents and fleet state backed by the
//! `ocp-client` mocks.

use crate::cluster::{ClusterHandle, FleetRegistry};
use crate::metrics::MetricsSink;
use ocp_client::{MockConnector, MockControlPlane};
use std::sync::Arc;

pub const KUBECONFIG_URL: &str = "https://configs.example.com/kubeconfig";

/// Kubeconfig with one context per `(context, server)` pair.
pub fn kubeconfig_yaml(contexts: &[(&str, &str)]) -> String {
    let mut clusters = String::new();
    let mut named = String::new();
    for (context, server) in contexts {
        clusters.push_str(&format!(
            "- name: {context}-cluster\n  cluster:\n    server: {server}\n"
        ));
        named.push_str(&format!(
            "- name: {context}\n  context:\n    cluster: {context}-cluster\n    user: monitor\n"
        ));
    }

    format!(
        "apiVersion: v1\nkind: Config\nclusters:\n{clusters}contexts:\n{named}users:\n- name: monitor\n  user:\n    token: test-token\n"
    )
}

/// Handle over a fresh mock control plane; the mock is returned for setup.
pub fn cluster_handle(api_url: &str, sink: Arc<dyn MetricsSink>) -> (Arc<ClusterHandle>, MockControlPlane) {
    let mock = MockControlPlane::new(api_url);
    let handle = Arc::new(ClusterHandle::new(Arc::new(mock.clone()), sink));
    (handle, mock)
}

pub fn registry(connector: MockConnector, sink: Arc<dyn MetricsSink>) -> Arc<FleetRegistry> {
    Arc::new(FleetRegistry::new(Arc::new(connector), sink))
}
