//! Synthetic deploy check
//!
//! Proves a cluster can run workloads by deploying a two-tier sample
//! application (postgres + a small task server), driving it over HTTP,
//! checking its log and tearing the project down again.
//!
//! ```text
//! deploy:   create project -> deploy database -> verify database
//!           -> deploy sample app -> verify sample app
//! exercise: /init, /add, /get/1, /drop -> log markers
//! teardown: delete project -> wait until it is gone   (always runs)
//! ```
//!
//! Each phase stops at its first failing step. `cluster.working` is 1 only if
//! all three phases succeed: a leaked project would break the next run.

use super::MonitoringJob;
use crate::cluster::{ClusterHandle, FleetRegistry};
use crate::config::SampleAppSettings;
use crate::error::MonitorError;
use crate::metrics::WORKING;
use crate::wait::wait_for;
use ocp_client::{
    ClientError, ControlPlane, HttpClient, HttpRequest, Pod, ProjectRequest, ResourceKind, manifest,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Name shared by the database service, claim and deployment
pub const DATABASE_NAME: &str = "sample-app-db";
/// Name shared by the sample app objects
pub const SAMPLE_APP_NAME: &str = "sample-app-server";
const BASE_IMAGE_STREAM: &str = "openjdk-11";
const ROUTE_SELECTOR: &str = "app=sample-app-server";

const PROJECT_DESCRIPTION: &str = "OpenShift monitoring test application";
const READY_MARKER: &str = "Sample app has started!";
const TASK: &str = "my first task";
const LOG_MARKERS: [&str; 4] = ["Initialized DB", "Added new task", "Got task", "Dropped task_list table"];

const PROJECT_TIMEOUT: Duration = Duration::from_secs(60);
const DEPLOY_TIMEOUT: Duration = Duration::from_secs(600);

fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

fn any_container_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .is_some_and(|statuses| statuses.iter().any(|status| status.ready))
}

/// Running database pod (not the deployer)
fn is_database_pod(pod: &Pod) -> bool {
    let name = pod_name(pod);
    name.contains(DATABASE_NAME) && !name.contains("deploy") && any_container_ready(pod)
}

/// Application pod (not the builder or deployer), ready or not
fn is_app_pod(pod: &Pod) -> bool {
    let name = pod_name(pod);
    name.contains(SAMPLE_APP_NAME) && !name.contains("deploy") && !name.contains("build")
}

async fn has_named(
    client: &dyn ControlPlane,
    namespace: &str,
    kind: ResourceKind,
    name: &str,
) -> Result<bool, ClientError> {
    Ok(client.list_names(namespace, kind).await?.iter().any(|n| n == name))
}

async fn project_exists(client: &dyn ControlPlane, namespace: &str) -> Result<bool, ClientError> {
    Ok(client.list_projects().await?.iter().any(|p| p == namespace))
}

/// Publishes `cluster.working` from the synthetic deploy workflow
pub struct DeployCheckJob {
    registry: Arc<FleetRegistry>,
    http: Arc<dyn HttpClient>,
    settings: SampleAppSettings,
}

impl DeployCheckJob {
    /// Job over the shared registry and HTTP client
    pub fn new(registry: Arc<FleetRegistry>, http: Arc<dyn HttpClient>, settings: SampleAppSettings) -> Self {
        Self { registry, http, settings }
    }

    /// Run the full workflow against one cluster.
    pub async fn check_cluster(&self, cluster: &ClusterHandle) -> bool {
        let client = cluster.client();
        info!("Running deploy check on {}", cluster.identity());

        let mut working = false;
        if self.deploy(client).await {
            working = self.exercise(client).await;
        }
        let destroyed = self.destroy(client).await;

        info!(
            "Deploy check on {}: working={}, destroyed={}",
            cluster.identity(),
            working,
            destroyed
        );
        working && destroyed
    }

    async fn deploy(&self, client: &dyn ControlPlane) -> bool {
        self.create_new_project(client).await
            && self.deploy_database(client).await
            && self.verify_database_deployed(client).await
            && self.deploy_sample_app(client).await
            && self.verify_sample_app_deployed(client).await
    }

    async fn exercise(&self, client: &dyn ControlPlane) -> bool {
        self.verify_sample_app_working(client).await && self.verify_sample_app_log(client).await
    }

    async fn fetch(&self, url: &str) -> Result<String, MonitorError> {
        let response = self.http.get(url).await?;
        if !response.is_success() {
            return Err(ClientError::Api(format!("GET {} returned {}", url, response.status)).into());
        }
        Ok(response.body)
    }

    async fn create_new_project(&self, client: &dyn ControlPlane) -> bool {
        let namespace = self.settings.namespace.as_str();

        let user = match client.current_user().await {
            Ok(user) => user,
            Err(e) => {
                error!("Couldn't retrieve current user name on {}: {}", client.api_url(), e);
                return false;
            }
        };

        let request = ProjectRequest {
            name: namespace.to_string(),
            display_name: namespace.replace('-', " "),
            description: PROJECT_DESCRIPTION.to_string(),
            requester: user,
        };
        if let Err(e) = client.create_project(&request).await {
            error!("Couldn't create project {} on {}: {}", namespace, client.api_url(), e);
            return false;
        }

        let created = wait_for(PROJECT_TIMEOUT, move || async move {
            Ok::<_, anyhow::Error>(project_exists(client, namespace).await?)
        })
        .await;
        if let Err(e) = created {
            error!("Couldn't verify project {} was created on {}: {}", namespace, client.api_url(), e);
            return false;
        }
        true
    }

    async fn deploy_database(&self, client: &dyn ControlPlane) -> bool {
        let objects = match self.fetch(&self.settings.database_url).await {
            Ok(text) => manifest::parse_objects(&text).map_err(MonitorError::from),
            Err(e) => Err(e),
        };
        let objects = match objects {
            Ok(objects) => objects,
            Err(e) => {
                error!("Couldn't load the database manifest {}: {}", self.settings.database_url, e);
                return false;
            }
        };

        if let Err(e) = client.create_objects(&self.settings.namespace, &objects).await {
            error!("Couldn't create the database on {}: {}", client.api_url(), e);
            return false;
        }
        true
    }

    async fn verify_database_deployed(&self, client: &dyn ControlPlane) -> bool {
        let namespace = self.settings.namespace.as_str();

        let ready = wait_for(DEPLOY_TIMEOUT, move || async move {
            for kind in [
                ResourceKind::Service,
                ResourceKind::PersistentVolumeClaim,
                ResourceKind::DeploymentConfig,
            ] {
                if !has_named(client, namespace, kind, DATABASE_NAME).await? {
                    return Ok(false);
                }
            }
            Ok::<_, anyhow::Error>(client.list_pods(namespace).await?.iter().any(is_database_pod))
        })
        .await;

        if let Err(e) = ready {
            error!("Couldn't verify the database resources on {}: {}", client.api_url(), e);
            return false;
        }
        true
    }

    /// Cluster IP of the database service
    async fn resolve_database_address(&self, client: &dyn ControlPlane) -> Option<String> {
        let services = match client.list_services(&self.settings.namespace).await {
            Ok(services) => services,
            Err(e) => {
                error!("Couldn't retrieve the database service on {}: {}", client.api_url(), e);
                return None;
            }
        };

        let address = services
            .into_iter()
            .find(|svc| svc.metadata.name.as_deref().is_some_and(|n| n.contains(DATABASE_NAME)))
            .and_then(|svc| svc.spec)
            .and_then(|spec| spec.cluster_ip);
        if address.is_none() {
            error!("Couldn't find the database service address on {}", client.api_url());
        }
        address
    }

    async fn deploy_sample_app(&self, client: &dyn ControlPlane) -> bool {
        let namespace = self.settings.namespace.as_str();
        let Some(database_ip) = self.resolve_database_address(client).await else {
            return false;
        };

        let mut parameters = BTreeMap::new();
        parameters.insert("APP_NAME".to_string(), SAMPLE_APP_NAME.to_string());
        parameters.insert("DB_SERVICE_IP".to_string(), database_ip);

        let template = match self.fetch(&self.settings.template_url).await {
            Ok(text) => manifest::parse_single(&text).map_err(MonitorError::from),
            Err(e) => Err(e),
        };
        let template = match template {
            Ok(template) => template,
            Err(e) => {
                error!("Couldn't load the sample app template {}: {}", self.settings.template_url, e);
                return false;
            }
        };

        let objects = match client.process_template(namespace, &template, &parameters).await {
            Ok(objects) => objects,
            Err(e) => {
                error!("Couldn't process the sample app template on {}: {}", client.api_url(), e);
                return false;
            }
        };
        if let Err(e) = client.create_objects(namespace, &objects).await {
            error!("Couldn't deploy the sample app on {}: {}", client.api_url(), e);
            return false;
        }
        true
    }

    async fn verify_sample_app_deployed(&self, client: &dyn ControlPlane) -> bool {
        let namespace = self.settings.namespace.as_str();

        let ready = wait_for(DEPLOY_TIMEOUT, move || async move {
            let expected = [
                (ResourceKind::Service, SAMPLE_APP_NAME),
                (ResourceKind::Route, SAMPLE_APP_NAME),
                (ResourceKind::DeploymentConfig, SAMPLE_APP_NAME),
                (ResourceKind::BuildConfig, SAMPLE_APP_NAME),
                (ResourceKind::ImageStream, BASE_IMAGE_STREAM),
                (ResourceKind::ImageStream, SAMPLE_APP_NAME),
            ];
            for (kind, name) in expected {
                if !has_named(client, namespace, kind, name).await? {
                    return Ok(false);
                }
            }

            let pods = client.list_pods(namespace).await?;
            for pod in pods.iter().filter(|pod| is_app_pod(pod) && any_container_ready(pod)) {
                if client.pod_log(namespace, pod_name(pod)).await?.contains(READY_MARKER) {
                    return Ok(true);
                }
            }
            Ok::<_, anyhow::Error>(false)
        })
        .await;

        if let Err(e) = ready {
            error!("Couldn't verify the sample app resources on {}: {}", client.api_url(), e);
            return false;
        }
        true
    }

    async fn verify_sample_app_working(&self, client: &dyn ControlPlane) -> bool {
        let host = match client.route_hosts(&self.settings.namespace, ROUTE_SELECTOR).await {
            Ok(hosts) => hosts.into_iter().next(),
            Err(e) => {
                error!("Couldn't retrieve the sample app route on {}: {}", client.api_url(), e);
                return false;
            }
        };
        let Some(host) = host else {
            error!("No route for the sample app on {}", client.api_url());
            return false;
        };

        let base = format!("http://{}", host);
        let calls = [
            (HttpRequest::get(format!("{}/init", base)), "Tasks table created"),
            (
                HttpRequest::post(format!("{}/add", base), TASK).header("Content-Type", "text/plain"),
                "Success",
            ),
            (HttpRequest::get(format!("{}/get/1", base)), TASK),
            (HttpRequest::get(format!("{}/drop", base)), "Tasks table dropped"),
        ];

        for (request, expected) in calls {
            let target = format!("{} {}", request.method, request.url);
            match self.http.request(request).await {
                Ok(response) if response.body.contains(expected) => {}
                Ok(response) => {
                    error!(
                        "{} expected {:?}, got HTTP {}: {:?}",
                        target, expected, response.status, response.body
                    );
                    return false;
                }
                Err(e) => {
                    error!("{} failed: {}", target, e);
                    return false;
                }
            }
        }
        true
    }

    async fn verify_sample_app_log(&self, client: &dyn ControlPlane) -> bool {
        let namespace = self.settings.namespace.as_str();
        let pods = match client.list_pods(namespace).await {
            Ok(pods) => pods,
            Err(e) => {
                error!("Couldn't list sample app pods on {}: {}", client.api_url(), e);
                return false;
            }
        };

        for pod in pods.iter().filter(|pod| is_app_pod(pod)) {
            match client.pod_log(namespace, pod_name(pod)).await {
                Ok(log) if LOG_MARKERS.iter().all(|marker| log.contains(marker)) => return true,
                Ok(_) => {}
                Err(e) => {
                    error!("Couldn't read the log of {} on {}: {}", pod_name(pod), client.api_url(), e);
                    return false;
                }
            }
        }

        error!("Sample app log on {} is missing expected entries", client.api_url());
        false
    }

    async fn destroy(&self, client: &dyn ControlPlane) -> bool {
        let namespace = self.settings.namespace.as_str();

        match client.delete_project(namespace).await {
            Ok(true) => {}
            Ok(false) => {
                error!("Deletion of project {} was not accepted by {}", namespace, client.api_url());
                return false;
            }
            Err(e) => {
                error!("Couldn't delete project {} on {}: {}", namespace, client.api_url(), e);
                return false;
            }
        }

        let gone = wait_for(PROJECT_TIMEOUT, move || async move {
            Ok::<_, anyhow::Error>(!project_exists(client, namespace).await?)
        })
        .await;
        if let Err(e) = gone {
            error!("Project {} is still present on {}: {}", namespace, client.api_url(), e);
            return false;
        }
        true
    }
}

#[async_trait::async_trait]
impl MonitoringJob for DeployCheckJob {
    async fn execute(&self) {
        for cluster in self.registry.clusters().await {
            let working = self.check_cluster(&cluster).await;
            cluster.set_flag(WORKING, working);
        }
    }
}

#[cfg(test)]
#[path = "deploy_check_test.rs"]
mod tests;
