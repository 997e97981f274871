//! Collaborator traits for mocking
//!
//! The monitoring jobs only ever see these traits. The concrete kube/reqwest
//! implementations live in `client.rs` and `http.rs`; the `test-util` feature
//! provides in-memory implementations.

use crate::error::ClientError;
use crate::models::*;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Operations against a single cluster's control plane.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    /// Canonical API server URL of the cluster
    fn api_url(&self) -> &str;

    // Cluster-wide reads
    /// All nodes of the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError>;
    /// Web console URL, if the cluster reports one
    async fn console_url(&self) -> Result<Option<String>, ClientError>;
    /// Name of the authenticated user
    async fn current_user(&self) -> Result<String, ClientError>;

    // Projects
    /// Create a project and grant the requester admin on it
    async fn create_project(&self, request: &ProjectRequest) -> Result<(), ClientError>;
    /// Names of all visible projects
    async fn list_projects(&self) -> Result<Vec<String>, ClientError>;
    /// Returns `false` when the control plane did not accept the deletion
    async fn delete_project(&self, name: &str) -> Result<bool, ClientError>;

    // Workloads
    /// Create every object in the namespace
    async fn create_objects(&self, namespace: &str, objects: &[DynamicObject]) -> Result<(), ClientError>;
    /// Render a template server-side with the given parameters
    async fn process_template(
        &self,
        namespace: &str,
        template: &DynamicObject,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, ClientError>;
    /// Names of all objects of `kind` in the namespace
    async fn list_names(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<String>, ClientError>;
    /// Services in the namespace
    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, ClientError>;
    /// Pods in the namespace
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClientError>;
    /// Full log of the pod's first container
    async fn pod_log(&self, namespace: &str, pod: &str) -> Result<String, ClientError>;
    /// Hosts of the routes matching a label selector (`key=value`)
    async fn route_hosts(&self, namespace: &str, label_selector: &str) -> Result<Vec<String>, ClientError>;
}

/// Builds control-plane connections from kubeconfig documents.
#[async_trait::async_trait]
pub trait ControlPlaneConnector: Send + Sync {
    /// Connect to the cluster `context` points at
    async fn connect(&self, kubeconfig: &str, context: &str) -> Result<Arc<dyn ControlPlane>, ClientError>;
}

/// Generic synchronous-style HTTP exchange.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request; transport failures are errors, non-2xx statuses are not
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;

    /// GET `url`
    async fn get(&self, url: &str) -> Result<HttpResponse, ClientError> {
        self.request(HttpRequest::get(url)).await
    }
}
