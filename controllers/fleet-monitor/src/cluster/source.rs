//! Kubeconfig source
//!
//! Cached contents are only replaced by a successful fetch that parses as a
//! kubeconfig. A failed or garbled fetch keeps the previous document.

use super::ClusterHandle;
use crate::error::MonitorError;
use crate::metrics::MetricsSink;
use ocp_client::{ControlPlaneConnector, HttpClient, kubeconfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// One remote kubeconfig document and the clusters built from its contexts
pub struct KubeconfigSource {
    url: String,
    contents: Mutex<Option<String>>,
    // Held across `connect`, so get-or-create is atomic per source.
    clusters: tokio::sync::Mutex<HashMap<String, Arc<ClusterHandle>>>,
    connector: Arc<dyn ControlPlaneConnector>,
    sink: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for KubeconfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeconfigSource")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl KubeconfigSource {
    /// Source with no contents and no clusters
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn ControlPlaneConnector>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            url: url.into(),
            contents: Mutex::new(None),
            clusters: tokio::sync::Mutex::new(HashMap::new()),
            connector,
            sink,
        }
    }

    /// URL of the kubeconfig document
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Last accepted kubeconfig document, if any fetch has succeeded yet
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|contents| contents.clone())
    }

    /// Refetch the document. Returns whether new contents were accepted.
    pub async fn update_contents(&self, http: &dyn HttpClient) -> bool {
        let body = match http.get(&self.url).await {
            Ok(response) if response.is_success() => response.body,
            Ok(response) => {
                warn!(
                    "Kubeconfig {} returned HTTP {}, keeping previous contents",
                    self.url, response.status
                );
                return false;
            }
            Err(e) => {
                error!("Failed to fetch kubeconfig {}: {}, keeping previous contents", self.url, e);
                return false;
            }
        };

        if let Err(e) = kubeconfig::parse(&body) {
            error!("Kubeconfig {} is not valid: {}, keeping previous contents", self.url, e);
            return false;
        }

        match self.contents.lock() {
            Ok(mut contents) => {
                *contents = Some(body);
                true
            }
            Err(_) => {
                error!("Contents lock for {} poisoned", self.url);
                false
            }
        }
    }

    /// Handle for `context`, connecting on first request.
    pub async fn get_or_create_cluster(&self, context: &str) -> Result<Arc<ClusterHandle>, MonitorError> {
        let mut clusters = self.clusters.lock().await;
        if let Some(handle) = clusters.get(context) {
            return Ok(Arc::clone(handle));
        }

        let contents = self.contents().ok_or_else(|| {
            MonitorError::InvalidConfig(format!("kubeconfig {} has not been fetched successfully", self.url))
        })?;
        let client = self.connector.connect(&contents, context).await?;
        let handle = Arc::new(ClusterHandle::new(client, Arc::clone(&self.sink)));

        if let Some((other, _)) = clusters.iter().find(|(_, h)| h.identity() == handle.identity()) {
            warn!(
                "Contexts {} and {} in {} point at the same cluster {}; their metrics collide",
                other,
                context,
                self.url,
                handle.identity()
            );
        }

        info!("Tracking cluster {} (context {})", handle.identity(), context);
        clusters.insert(context.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Close and forget every tracked cluster that is not in `desired`.
    ///
    /// Membership is by handle identity (`Arc::ptr_eq`), not by context name.
    pub async fn reconcile(&self, desired: &[Arc<ClusterHandle>]) {
        let mut clusters = self.clusters.lock().await;
        clusters.retain(|context, handle| {
            let keep = desired.iter().any(|wanted| Arc::ptr_eq(wanted, handle));
            if !keep {
                info!("Removing cluster {} (context {})", handle.identity(), context);
                handle.close();
            }
            keep
        });
    }

    /// Snapshot of the tracked clusters
    pub async fn clusters(&self) -> Vec<Arc<ClusterHandle>> {
        self.clusters.lock().await.values().cloned().collect()
    }

    /// Tracked context names, sorted
    pub async fn contexts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{NODE_COUNT, PrometheusSink};
    use crate::test_utils::{KUBECONFIG_URL, kubeconfig_yaml};
    use ocp_client::{MockConnector, MockHttpClient};

    fn source(connector: &MockConnector, sink: &Arc<PrometheusSink>) -> KubeconfigSource {
        KubeconfigSource::new(KUBECONFIG_URL, Arc::new(connector.clone()), sink.clone())
    }

    #[tokio::test]
    async fn test_failed_or_invalid_fetch_keeps_stale_contents() {
        let http = MockHttpClient::new();
        let source = source(&MockConnector::new(), &Arc::new(PrometheusSink::new()));
        let valid = kubeconfig_yaml(&[("prod-a", "https://api.cluster-1.example.com:6443")]);

        http.respond_get(KUBECONFIG_URL, 200, &valid);
        assert!(source.update_contents(&http).await);

        http.respond_get(KUBECONFIG_URL, 200, "");
        assert!(!source.update_contents(&http).await);
        http.respond_get(KUBECONFIG_URL, 200, "this: [is not a kubeconfig");
        assert!(!source.update_contents(&http).await);
        http.respond_get(KUBECONFIG_URL, 503, &valid.replace("prod-a", "prod-z"));
        assert!(!source.update_contents(&http).await);
        http.fail(ocp_client::HttpMethod::Get, KUBECONFIG_URL);
        assert!(!source.update_contents(&http).await);

        assert_eq!(source.contents(), Some(valid));
    }

    #[tokio::test]
    async fn test_api_error_body_keeps_stale_contents() {
        let http = MockHttpClient::new();
        let source = source(&MockConnector::new(), &Arc::new(PrometheusSink::new()));
        let valid = kubeconfig_yaml(&[("prod-a", "https://api.cluster-1.example.com:6443")]);

        http.respond_get(KUBECONFIG_URL, 200, &valid);
        assert!(source.update_contents(&http).await);
        http.respond_get(
            KUBECONFIG_URL,
            200,
            r#"{"kind":"Status","apiVersion":"v1","message":"upstream rate limited"}"#,
        );
        assert!(!source.update_contents(&http).await);

        assert_eq!(source.contents(), Some(valid));
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_connects_once() {
        let http = MockHttpClient::new();
        let connector = MockConnector::new();
        let source = Arc::new(source(&connector, &Arc::new(PrometheusSink::new())));
        http.respond_get(
            KUBECONFIG_URL,
            200,
            &kubeconfig_yaml(&[("prod-a", "https://api.cluster-1.example.com:6443")]),
        );
        source.update_contents(&http).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let source = Arc::clone(&source);
            tasks.spawn(async move { source.get_or_create_cluster("prod-a").await.unwrap() });
        }
        let handles = tasks.join_all().await;

        assert!(handles.iter().all(|handle| Arc::ptr_eq(handle, &handles[0])));
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(source.clusters().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let http = MockHttpClient::new();
        let connector = MockConnector::new();
        let source = source(&connector, &Arc::new(PrometheusSink::new()));
        http.respond_get(
            KUBECONFIG_URL,
            200,
            &kubeconfig_yaml(&[("prod-a", "https://api.cluster-1.example.com:6443/")]),
        );
        source.update_contents(&http).await;

        let first = source.get_or_create_cluster("prod-a").await.unwrap();
        let second = source.get_or_create_cluster("prod-a").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.identity(), "https://api.cluster-1.example.com:6443");
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_without_contents_fails() {
        let source = source(&MockConnector::new(), &Arc::new(PrometheusSink::new()));
        assert!(matches!(
            source.get_or_create_cluster("prod-a").await,
            Err(MonitorError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_reconcile_closes_and_drops_undesired_clusters() {
        let http = MockHttpClient::new();
        let sink = Arc::new(PrometheusSink::new());
        let source = source(&MockConnector::new(), &sink);
        http.respond_get(
            KUBECONFIG_URL,
            200,
            &kubeconfig_yaml(&[
                ("prod-a", "https://api.cluster-1.example.com:6443"),
                ("prod-b", "https://api.cluster-2.example.com:6443"),
            ]),
        );
        source.update_contents(&http).await;

        let a = source.get_or_create_cluster("prod-a").await.unwrap();
        let b = source.get_or_create_cluster("prod-b").await.unwrap();
        a.set_metric(NODE_COUNT, 3, &[]);
        b.set_metric(NODE_COUNT, 4, &[]);

        source.reconcile(&[Arc::clone(&a)]).await;

        assert_eq!(source.contexts().await, vec!["prod-a"]);
        assert!(b.is_closed());
        assert!(!a.is_closed());
        let text = sink.encode().unwrap();
        assert!(text.contains("cluster-1"));
        assert!(!text.contains("cluster-2"));
    }
}
