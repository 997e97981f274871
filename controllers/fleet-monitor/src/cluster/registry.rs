//! Fleet registry: the single source of truth for which clusters exist.

use super::{ClusterHandle, KubeconfigSource};
use crate::metrics::{ACCESSIBLE, MetricsSink, WORKING};
use ocp_client::ControlPlaneConnector;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Sources only ever get added; a source whose document lost every context
/// stays registered with no clusters.
pub struct FleetRegistry {
    sources: Mutex<BTreeMap<String, Arc<KubeconfigSource>>>,
    connector: Arc<dyn ControlPlaneConnector>,
    sink: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for FleetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetRegistry").finish_non_exhaustive()
    }
}

impl FleetRegistry {
    /// Empty registry; sources are added on request
    pub fn new(connector: Arc<dyn ControlPlaneConnector>, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sources: Mutex::new(BTreeMap::new()),
            connector,
            sink,
        }
    }

    /// Sink every cluster handle publishes to
    pub fn sink(&self) -> Arc<dyn MetricsSink> {
        Arc::clone(&self.sink)
    }

    /// Source for `url`, created on first request
    pub fn get_or_create_source(&self, url: &str) -> Arc<KubeconfigSource> {
        let mut sources = self.sources.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let source = sources.entry(url.to_string()).or_insert_with(|| {
            Arc::new(KubeconfigSource::new(
                url,
                Arc::clone(&self.connector),
                Arc::clone(&self.sink),
            ))
        });
        Arc::clone(source)
    }

    /// Snapshot of the registered sources, ordered by URL
    pub fn sources(&self) -> Vec<Arc<KubeconfigSource>> {
        self.sources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of every tracked cluster across all sources
    pub async fn clusters(&self) -> Vec<Arc<ClusterHandle>> {
        let mut clusters = Vec::new();
        for source in self.sources() {
            clusters.extend(source.clusters().await);
        }
        clusters
    }

    /// Identities of clusters that are both working and accessible
    pub async fn working_clusters(&self) -> BTreeSet<String> {
        self.clusters()
            .await
            .into_iter()
            .filter(|cluster| cluster.get_metric(WORKING) == Some(1) && cluster.get_metric(ACCESSIBLE) == Some(1))
            .map(|cluster| cluster.identity().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PrometheusSink;
    use crate::test_utils::{kubeconfig_yaml, registry};
    use ocp_client::{MockConnector, MockHttpClient};

    #[test]
    fn test_get_or_create_source_is_idempotent() {
        let registry = registry(MockConnector::new(), Arc::new(PrometheusSink::new()));
        let first = registry.get_or_create_source("https://configs.example.com/a");
        let second = registry.get_or_create_source("https://configs.example.com/a");
        registry.get_or_create_source("https://configs.example.com/b");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.sources().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_source_creation_yields_one_source() {
        let registry = registry(MockConnector::new(), Arc::new(PrometheusSink::new()));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.spawn(async move { registry.get_or_create_source("https://configs.example.com/a") });
        }
        let sources: Vec<_> = tasks.join_all().await;

        assert!(sources.iter().all(|s| Arc::ptr_eq(s, &sources[0])));
        assert_eq!(registry.sources().len(), 1);
    }

    #[tokio::test]
    async fn test_working_clusters_require_both_flags() {
        let registry = registry(MockConnector::new(), Arc::new(PrometheusSink::new()));
        let http = MockHttpClient::new();
        let url = "https://configs.example.com/a";
        http.respond_get(
            url,
            200,
            &kubeconfig_yaml(&[
                ("prod-a", "https://api.cluster-1.example.com:6443"),
                ("prod-b", "https://api.cluster-2.example.com:6443"),
                ("prod-c", "https://api.cluster-3.example.com:6443"),
            ]),
        );
        let source = registry.get_or_create_source(url);
        source.update_contents(&http).await;

        let a = source.get_or_create_cluster("prod-a").await.unwrap();
        let b = source.get_or_create_cluster("prod-b").await.unwrap();
        source.get_or_create_cluster("prod-c").await.unwrap();
        a.set_flag(WORKING, true);
        a.set_flag(ACCESSIBLE, true);
        b.set_flag(WORKING, true);
        b.set_flag(ACCESSIBLE, false);

        let working = registry.working_clusters().await;
        assert_eq!(working.into_iter().collect::<Vec<_>>(), vec!["https://api.cluster-1.example.com:6443"]);
        assert_eq!(registry.clusters().await.len(), 3);
    }
}
