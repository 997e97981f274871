//! Node check: total and ready node counts per cluster.

use super::MonitoringJob;
use crate::cluster::{ClusterHandle, FleetRegistry};
use crate::metrics::{NODE_COUNT, READY_NODE_COUNT};
use ocp_client::Node;
use std::sync::Arc;
use tracing::{debug, error};

/// A node is ready when it has a `Ready` condition with status `True`
/// (both compared case-insensitively).
pub fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions.iter().any(|condition| {
                condition.type_.eq_ignore_ascii_case("ready") && condition.status.eq_ignore_ascii_case("true")
            })
        })
}

/// Publishes node and ready node counts
pub struct NodeCheckJob {
    registry: Arc<FleetRegistry>,
}

impl NodeCheckJob {
    /// Job over the shared registry
    pub fn new(registry: Arc<FleetRegistry>) -> Self {
        Self { registry }
    }

    async fn check(&self, cluster: &ClusterHandle) {
        let nodes = match cluster.client().list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                error!("Couldn't retrieve node list of {}: {}", cluster.identity(), e);
                return;
            }
        };

        let ready = nodes.iter().filter(|node| is_ready(node)).count();
        debug!("{}: {}/{} nodes ready", cluster.identity(), ready, nodes.len());

        cluster.set_metric(NODE_COUNT, nodes.len() as i64, &[]);
        cluster.set_metric(READY_NODE_COUNT, ready as i64, &[]);
    }
}

#[async_trait::async_trait]
impl MonitoringJob for NodeCheckJob {
    async fn execute(&self) {
        for cluster in self.registry.clusters().await {
            self.check(&cluster).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PrometheusSink;
    use crate::test_utils::{KUBECONFIG_URL, kubeconfig_yaml, registry};
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};
    use ocp_client::{MockConnector, MockControlPlane, MockHttpClient};

    fn node_with_condition(type_: &str, status: &str) -> Node {
        Node {
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: type_.to_string(),
                    status: status.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_ready() {
        assert!(is_ready(&node_with_condition("Ready", "True")));
        assert!(is_ready(&node_with_condition("READY", "true")));
        assert!(!is_ready(&node_with_condition("Ready", "False")));
        assert!(!is_ready(&node_with_condition("Ready", "Unknown")));
        assert!(!is_ready(&node_with_condition("MemoryPressure", "True")));
        assert!(!is_ready(&Node::default()));
    }

    async fn fleet(connector: &MockConnector) -> Arc<FleetRegistry> {
        let registry = registry(connector.clone(), Arc::new(PrometheusSink::new()));
        let http = MockHttpClient::new();
        http.respond_get(
            KUBECONFIG_URL,
            200,
            &kubeconfig_yaml(&[
                ("prod-a", "https://api.cluster-1.example.com:6443"),
                ("prod-b", "https://api.cluster-2.example.com:6443"),
            ]),
        );
        let source = registry.get_or_create_source(KUBECONFIG_URL);
        source.update_contents(&http).await;
        source.get_or_create_cluster("prod-a").await.unwrap();
        source.get_or_create_cluster("prod-b").await.unwrap();
        registry
    }

    fn cluster(clusters: &[Arc<ClusterHandle>], identity: &str) -> Arc<ClusterHandle> {
        clusters.iter().find(|c| c.identity() == identity).cloned().unwrap()
    }

    #[tokio::test]
    async fn test_counts_nodes_per_cluster() {
        let connector = MockConnector::new();
        connector.control_plane("https://api.cluster-1.example.com:6443").set_nodes(vec![
            MockControlPlane::node("master-0", true),
            MockControlPlane::node("worker-0", true),
            MockControlPlane::node("worker-1", false),
        ]);
        let registry = fleet(&connector).await;

        NodeCheckJob::new(Arc::clone(&registry)).execute().await;

        let clusters = registry.clusters().await;
        let a = cluster(&clusters, "https://api.cluster-1.example.com:6443");
        let b = cluster(&clusters, "https://api.cluster-2.example.com:6443");
        assert_eq!(a.get_metric(NODE_COUNT), Some(3));
        assert_eq!(a.get_metric(READY_NODE_COUNT), Some(2));
        assert_eq!(b.get_metric(NODE_COUNT), Some(0));
    }

    #[tokio::test]
    async fn test_api_failure_leaves_metrics_untouched() {
        let connector = MockConnector::new();
        let mock = connector.control_plane("https://api.cluster-1.example.com:6443");
        mock.set_nodes(vec![MockControlPlane::node("master-0", true)]);
        let registry = fleet(&connector).await;
        let job = NodeCheckJob::new(Arc::clone(&registry));
        job.execute().await;

        mock.set_nodes(Vec::new());
        mock.fail("list_nodes");
        job.execute().await;

        let clusters = registry.clusters().await;
        let a = cluster(&clusters, "https://api.cluster-1.example.com:6443");
        assert_eq!(a.get_metric(NODE_COUNT), Some(1));
        assert_eq!(a.get_metric(READY_NODE_COUNT), Some(1));
    }
}
