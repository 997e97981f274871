//! Monitoring jobs
//!
//! Each job walks the fleet sequentially and writes metrics onto cluster
//! handles. Jobs never return errors: every failure is logged and becomes a
//! metric value (or a skipped write).

mod accessibility;
mod deploy_check;
mod node_check;
mod update_kubeconfigs;

pub use accessibility::AccessibilityJob;
pub use deploy_check::DeployCheckJob;
pub use node_check::NodeCheckJob;
pub use update_kubeconfigs::UpdateKubeconfigsJob;

use crate::cluster::FleetRegistry;
use crate::config::Configuration;
use ocp_client::HttpClient;
use std::sync::Arc;
use std::time::Duration;

/// One unit of periodic work.
#[async_trait::async_trait]
pub trait MonitoringJob: Send + Sync {
    /// Run once over the whole fleet. Failures are logged, never returned.
    async fn execute(&self);
}

/// Schedule for a job
#[derive(Clone)]
pub struct JobConfig {
    /// Name used in logs
    pub name: &'static str,
    /// Time between run starts
    pub period: Duration,
    /// Delay before the first run
    pub initial_delay: Duration,
    /// Work to run
    pub job: Arc<dyn MonitoringJob>,
}

impl std::fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobConfig")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("initial_delay", &self.initial_delay)
            .finish_non_exhaustive()
    }
}

/// Every job the monitor runs.
pub fn monitoring_jobs(
    registry: Arc<FleetRegistry>,
    http: Arc<dyn HttpClient>,
    config: &Configuration,
) -> Vec<JobConfig> {
    vec![
        JobConfig {
            name: "update-kubeconfigs",
            period: Duration::from_secs(60),
            initial_delay: Duration::ZERO,
            job: Arc::new(UpdateKubeconfigsJob::new(
                Arc::clone(&registry),
                Arc::clone(&http),
                config.clone(),
            )),
        },
        JobConfig {
            name: "node-check",
            period: Duration::from_secs(60),
            initial_delay: Duration::ZERO,
            job: Arc::new(NodeCheckJob::new(Arc::clone(&registry))),
        },
        JobConfig {
            name: "accessibility-check",
            period: Duration::from_secs(60),
            initial_delay: Duration::ZERO,
            job: Arc::new(AccessibilityJob::new(Arc::clone(&registry), Arc::clone(&http))),
        },
        JobConfig {
            name: "deploy-check",
            period: Duration::from_secs(60 * 60),
            initial_delay: Duration::from_secs(90),
            job: Arc::new(DeployCheckJob::new(registry, http, config.sample_app())),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertySource;
    use crate::metrics::PrometheusSink;
    use crate::test_utils::registry;
    use ocp_client::{MockConnector, MockHttpClient};

    #[test]
    fn test_job_schedule() {
        let config = Configuration::new(PropertySource::default());
        let jobs = monitoring_jobs(
            registry(MockConnector::new(), Arc::new(PrometheusSink::new())),
            Arc::new(MockHttpClient::new()),
            &config,
        );

        let schedule: Vec<_> = jobs
            .iter()
            .map(|j| (j.name, j.period.as_secs(), j.initial_delay.as_secs()))
            .collect();
        assert_eq!(
            schedule,
            vec![
                ("update-kubeconfigs", 60, 0),
                ("node-check", 60, 0),
                ("accessibility-check", 60, 0),
                ("deploy-check", 3600, 90),
            ]
        );
    }
}
