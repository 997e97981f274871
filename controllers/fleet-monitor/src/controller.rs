//! Main controller implementation.
//!
//! Wires the fleet registry, the monitoring jobs and the query surface
//! together, then runs them until one of them stops.

use crate::api::{self, ApiState};
use crate::cluster::FleetRegistry;
use crate::config::Configuration;
use crate::error::MonitorError;
use crate::jobs::monitoring_jobs;
use crate::metrics::{MetricsSink, PrometheusSink};
use crate::scheduler::JobScheduler;
use ocp_client::{ControlPlaneConnector, HttpClient, KubeConnector, ReqwestHttpClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};

/// Running jobs and query surface
pub struct Controller {
    jobs: JoinSet<()>,
    server: JoinHandle<Result<(), MonitorError>>,
}

impl Controller {
    /// Build every collaborator, start the jobs and bind the query surface.
    pub async fn new(config: Configuration) -> Result<Self, MonitorError> {
        info!("Initializing fleet monitor");

        let sink: Arc<dyn MetricsSink> = Arc::new(PrometheusSink::new());
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
        let connector: Arc<dyn ControlPlaneConnector> = Arc::new(KubeConnector::new());
        let registry = Arc::new(FleetRegistry::new(connector, sink));

        for entry in config.kubeconfigs() {
            match &entry.filters {
                Ok(filters) => info!("  {} -> {} (filters: {:?})", entry.key, entry.url, filters),
                Err(e) => error!("  {} -> {} is misconfigured: {}", entry.key, entry.url, e),
            }
        }
        info!("  Test namespace: {}", config.namespace());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port()?));
        let listener = TcpListener::bind(addr).await?;

        let jobs = JobScheduler::new(monitoring_jobs(Arc::clone(&registry), http, &config)).start();
        let server = tokio::spawn(api::serve(listener, ApiState { registry }));

        Ok(Self { jobs, server })
    }

    /// Wait until the jobs or the server stop. Neither is expected to.
    pub async fn run(mut self) -> Result<(), MonitorError> {
        info!("Fleet monitor running");

        // Neither side is expected to finish on its own.
        tokio::select! {
            result = self.jobs.join_next() => match result {
                Some(Err(e)) => Err(MonitorError::Server(format!("monitoring job panicked: {}", e))),
                _ => Err(MonitorError::Server("monitoring jobs stopped".to_string())),
            },
            result = &mut self.server => {
                result.map_err(|e| MonitorError::Server(format!("query surface panicked: {}", e)))?
            }
        }
    }
}
