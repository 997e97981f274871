//! Reconciliation job: refetch kubeconfig documents and bring the tracked
//! clusters in line with their (filtered) contexts.

use super::MonitoringJob;
use crate::cluster::{FleetRegistry, KubeconfigSource};
use crate::config::Configuration;
use ocp_client::{HttpClient, kubeconfig};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Contexts whose name contains every filter, in document order.
pub fn filter_contexts<'a>(names: &'a [String], filters: &[String]) -> Vec<&'a str> {
    names
        .iter()
        .filter(|name| filters.iter().all(|filter| name.contains(filter.as_str())))
        .map(String::as_str)
        .collect()
}

/// Refetches kubeconfig documents and reconciles the tracked clusters
pub struct UpdateKubeconfigsJob {
    registry: Arc<FleetRegistry>,
    http: Arc<dyn HttpClient>,
    config: Configuration,
}

impl UpdateKubeconfigsJob {
    /// Job over the shared registry and HTTP client
    pub fn new(registry: Arc<FleetRegistry>, http: Arc<dyn HttpClient>, config: Configuration) -> Self {
        Self { registry, http, config }
    }

    async fn update_clusters(&self, source: &KubeconfigSource, filters: &[String]) {
        let Some(contents) = source.contents() else {
            warn!("No valid contents for kubeconfig {} yet, skipping", source.url());
            return;
        };
        let names = match kubeconfig::context_names(&contents) {
            Ok(names) => names,
            Err(e) => {
                error!("Couldn't read contexts of kubeconfig {}: {}", source.url(), e);
                return;
            }
        };

        let mut desired = Vec::new();
        for context in filter_contexts(&names, filters) {
            match source.get_or_create_cluster(context).await {
                Ok(cluster) => desired.push(cluster),
                Err(e) => error!("Couldn't connect context {} of {}: {}", context, source.url(), e),
            }
        }
        source.reconcile(&desired).await;
        debug!("Kubeconfig {} tracks contexts {:?}", source.url(), source.contexts().await);
    }
}

#[async_trait::async_trait]
impl MonitoringJob for UpdateKubeconfigsJob {
    async fn execute(&self) {
        for entry in self.config.kubeconfigs() {
            let filters = match entry.filters {
                Ok(filters) => filters,
                Err(e) => {
                    error!("Skipping kubeconfig {} ({}): {}", entry.url, entry.key, e);
                    continue;
                }
            };

            let source = self.registry.get_or_create_source(&entry.url);
            source.update_contents(self.http.as_ref()).await;
            self.update_clusters(&source, &filters).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertySource;
    use crate::metrics::{MetricsSink, NODE_COUNT, PrometheusSink};
    use crate::test_utils::{kubeconfig_yaml, registry};
    use ocp_client::{MockConnector, MockHttpClient};

    const URL: &str = "https://configs.example.com/fleet";

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn job(
        registry: &Arc<FleetRegistry>,
        http: &MockHttpClient,
        env: &[(&str, &str)],
    ) -> UpdateKubeconfigsJob {
        let env = env.iter().map(|(k, v)| (k.to_string(), v.to_string()));
        let config = Configuration::new(PropertySource::new(env, Default::default()));
        UpdateKubeconfigsJob::new(Arc::clone(registry), Arc::new(http.clone()), config)
    }

    fn two_contexts() -> String {
        kubeconfig_yaml(&[
            ("prod-a", "https://api.cluster-1.example.com:6443"),
            ("prod-b", "https://api.cluster-2.example.com:6443"),
        ])
    }

    #[test]
    fn test_filter_contexts_requires_every_filter() {
        let contexts = names(&["prod-east-a", "prod-west-a", "dev-east-a"]);
        assert_eq!(filter_contexts(&contexts, &names(&["prod", "east"])), vec!["prod-east-a"]);
        assert_eq!(filter_contexts(&contexts, &[]).len(), 3);
        assert!(filter_contexts(&contexts, &names(&["staging"])).is_empty());
    }

    #[tokio::test]
    async fn test_filter_narrowing_removes_clusters_and_metrics() {
        let sink = Arc::new(PrometheusSink::new());
        let registry = registry(MockConnector::new(), sink.clone());
        let http = MockHttpClient::new();
        http.respond_get(URL, 200, &two_contexts());

        job(&registry, &http, &[("MONITORING_KUBECONFIG", URL), ("MONITORING_CONTEXT_FILTERS", "prod")])
            .execute()
            .await;
        let source = registry.get_or_create_source(URL);
        assert_eq!(source.contexts().await, vec!["prod-a", "prod-b"]);
        for cluster in source.clusters().await {
            cluster.set_metric(NODE_COUNT, 3, &[]);
        }

        job(&registry, &http, &[("MONITORING_KUBECONFIG", URL), ("MONITORING_CONTEXT_FILTERS", "prod-a")])
            .execute()
            .await;

        assert_eq!(source.contexts().await, vec!["prod-a"]);
        let text = sink.encode().unwrap();
        assert!(text.contains("cluster-1"));
        assert!(!text.contains("cluster-2"));
    }

    #[tokio::test]
    async fn test_error_body_does_not_drop_tracked_clusters() {
        let sink = Arc::new(PrometheusSink::new());
        let registry = registry(MockConnector::new(), sink.clone());
        let http = MockHttpClient::new();
        let env = [("MONITORING_KUBECONFIG", URL)];
        http.respond_get(URL, 200, &two_contexts());

        job(&registry, &http, &env).execute().await;
        for cluster in registry.clusters().await {
            cluster.set_metric(NODE_COUNT, 3, &[]);
        }
        http.respond_get(URL, 200, r#"{"kind":"Status","message":"upstream rate limited"}"#);
        job(&registry, &http, &env).execute().await;

        let clusters = registry.clusters().await;
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|cluster| !cluster.is_closed()));
        let text = sink.encode().unwrap();
        assert!(text.contains("cluster-1"));
        assert!(text.contains("cluster-2"));
    }

    #[tokio::test]
    async fn test_reconciliation_is_idempotent() {
        let connector = MockConnector::new();
        let registry = registry(connector.clone(), Arc::new(PrometheusSink::new()));
        let http = MockHttpClient::new();
        http.respond_get(URL, 200, &two_contexts());
        let job = job(&registry, &http, &[("MONITORING_KUBECONFIG", URL)]);

        job.execute().await;
        let before = registry.clusters().await;
        job.execute().await;
        let after = registry.clusters().await;

        let identities = |clusters: &[Arc<crate::cluster::ClusterHandle>]| {
            let mut ids: Vec<_> = clusters.iter().map(|c| c.identity().to_string()).collect();
            ids.sort();
            ids
        };
        assert_eq!(identities(&before), identities(&after));
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_existing_clusters() {
        let registry = registry(MockConnector::new(), Arc::new(PrometheusSink::new()));
        let http = MockHttpClient::new();
        http.respond_get(URL, 200, &two_contexts());
        let job = job(&registry, &http, &[("MONITORING_KUBECONFIG", URL)]);
        job.execute().await;

        http.respond_get(URL, 500, "");
        job.execute().await;

        assert_eq!(registry.clusters().await.len(), 2);
    }

    #[tokio::test]
    async fn test_uncorrelated_document_is_skipped() {
        let registry = registry(MockConnector::new(), Arc::new(PrometheusSink::new()));
        let http = MockHttpClient::new();
        let other = "https://configs.example.com/other";
        http.respond_get(URL, 200, &two_contexts());
        http.respond_get(other, 200, &kubeconfig_yaml(&[("qa-a", "https://api.cluster-3.example.com:6443")]));

        job(
            &registry,
            &http,
            &[
                ("MONITORING_KUBECONFIG_DEV", URL),
                ("MONITORING_KUBECONFIG_STAGE", other),
                ("MONITORING_CONTEXT_FILTERS_DEV", "prod-b"),
                ("MONITORING_CONTEXT_FILTERS_QA", "qa"),
            ],
        )
        .execute()
        .await;

        let sources = registry.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].contexts().await, vec!["prod-b"]);
    }

    #[tokio::test]
    async fn test_unreachable_context_is_left_out() {
        let connector = MockConnector::new();
        connector.fail_context("prod-b");
        let registry = registry(connector, Arc::new(PrometheusSink::new()));
        let http = MockHttpClient::new();
        http.respond_get(URL, 200, &two_contexts());

        job(&registry, &http, &[("MONITORING_KUBECONFIG", URL)]).execute().await;

        assert_eq!(registry.get_or_create_source(URL).contexts().await, vec!["prod-a"]);
    }
}
