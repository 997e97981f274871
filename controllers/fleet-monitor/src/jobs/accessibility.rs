//! Accessibility check: the API answers with a console URL and the console
//! itself answers with HTTP 200.

use super::MonitoringJob;
use crate::cluster::{ClusterHandle, FleetRegistry};
use crate::metrics::ACCESSIBLE;
use ocp_client::HttpClient;
use std::sync::Arc;
use tracing::{error, warn};

/// Publishes `cluster.accessible` from a GET against the web console
pub struct AccessibilityJob {
    registry: Arc<FleetRegistry>,
    http: Arc<dyn HttpClient>,
}

impl AccessibilityJob {
    /// Job over the shared registry and HTTP client
    pub fn new(registry: Arc<FleetRegistry>, http: Arc<dyn HttpClient>) -> Self {
        Self { registry, http }
    }

    async fn console_url(&self, cluster: &ClusterHandle) -> Option<String> {
        match cluster.client().console_url().await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                warn!("{} reports no console URL", cluster.identity());
                None
            }
            Err(e) => {
                error!("Couldn't retrieve the console URL of {}: {}", cluster.identity(), e);
                None
            }
        }
    }

    async fn console_responds(&self, console_url: &str) -> bool {
        match self.http.get(console_url).await {
            Ok(response) if response.status == 200 => true,
            Ok(response) => {
                error!("GET {} returned {}", console_url, response.status);
                false
            }
            Err(e) => {
                error!("GET {} failed: {}", console_url, e);
                false
            }
        }
    }

    async fn check(&self, cluster: &ClusterHandle) -> bool {
        match self.console_url(cluster).await {
            Some(url) => self.console_responds(&url).await,
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl MonitoringJob for AccessibilityJob {
    async fn execute(&self) {
        for cluster in self.registry.clusters().await {
            let accessible = self.check(&cluster).await;
            cluster.set_flag(ACCESSIBLE, accessible);
        }
    }
}
