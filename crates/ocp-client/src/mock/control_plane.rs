//! In-memory control plane
//!
//! Namespaces are not modelled: every namespaced call sees the same store,
//! which is all the synthetic deploy check needs.

use crate::client_trait::ControlPlane;
use crate::error::ClientError;
use crate::models::*;
use k8s_openapi::api::core::v1::{
    ContainerStatus, Node, NodeCondition, NodeStatus, Pod, PodStatus, Service, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub(crate) struct MockState {
    pub(crate) nodes: Vec<Node>,
    pub(crate) console_url: Option<String>,
    pub(crate) user: String,
    pub(crate) projects: BTreeSet<String>,
    pub(crate) resources: BTreeMap<ResourceKind, BTreeSet<String>>,
    pub(crate) services: Vec<Service>,
    pub(crate) pods: Vec<Pod>,
    pub(crate) logs: HashMap<String, String>,
    pub(crate) routes: Vec<(BTreeMap<String, String>, String)>,
    pub(crate) failing: HashSet<String>,
    pub(crate) ignore_deletes: bool,
    pub(crate) calls: HashMap<String, usize>,
}

/// Mock control plane for testing
///
/// Clones share state, so a test can keep one handle for setup and assertions
/// while the code under test holds another.
#[derive(Clone)]
pub struct MockControlPlane {
    pub(crate) api_url: String,
    pub(crate) state: Arc<Mutex<MockState>>,
}

impl MockControlPlane {
    /// Create a new mock control plane
    pub fn new(api_url: impl Into<String>) -> Self {
        let state = MockState {
            user: "monitoring-bot".to_string(),
            ..Default::default()
        };
        Self {
            api_url: api_url.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Build a node with a `Ready` condition
    pub fn node(name: &str, ready: bool) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build a pod with a single container
    pub fn pod(name: &str, ready: bool) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                container_statuses: Some(vec![ContainerStatus {
                    name: "main".to_string(),
                    ready,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Replace the node list (for test setup)
    pub fn set_nodes(&self, nodes: Vec<Node>) {
        self.state.lock().unwrap().nodes = nodes;
    }

    /// Set the console URL reported by the cluster (for test setup)
    pub fn set_console_url(&self, url: Option<&str>) {
        self.state.lock().unwrap().console_url = url.map(str::to_string);
    }

    /// Add a pod and its log (for test setup)
    pub fn add_pod(&self, name: &str, ready: bool, log: &str) {
        let mut state = self.state.lock().unwrap();
        state.pods.push(Self::pod(name, ready));
        state.logs.insert(name.to_string(), log.to_string());
    }

    /// Replace a pod's log
    pub fn set_pod_log(&self, name: &str, log: &str) {
        self.state.lock().unwrap().logs.insert(name.to_string(), log.to_string());
    }

    /// Make every call to `method` fail until [`Self::recover`] is called
    pub fn fail(&self, method: &str) {
        self.state.lock().unwrap().failing.insert(method.to_string());
    }

    /// Undo [`Self::fail`]
    pub fn recover(&self, method: &str) {
        self.state.lock().unwrap().failing.remove(method);
    }

    /// Accept project deletions without removing the project
    pub fn ignore_deletes(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_deletes = ignore;
    }

    /// Number of times `method` was called
    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
    }

    /// Whether the project currently exists
    pub fn has_project(&self, name: &str) -> bool {
        self.state.lock().unwrap().projects.contains(name)
    }

    /// Names of created resources of `kind`
    pub fn resource_names(&self, kind: ResourceKind) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .resources
            .get(&kind)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, method: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(method.to_string()).or_insert(0) += 1;
        if state.failing.contains(method) {
            return Err(ClientError::Api(format!("mock failure: {} on {}", method, self.api_url)));
        }
        Ok(())
    }

    fn store(state: &mut MockState, object: &DynamicObject) {
        let Some(kind) = object.types.as_ref().and_then(|t| ResourceKind::from_kind(&t.kind)) else {
            return;
        };
        let name = object.metadata.name.clone().unwrap_or_default();

        match kind {
            ResourceKind::Service => {
                let cluster_ip = format!("172.30.0.{}", state.services.len() + 10);
                state.services.push(Service {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        ..Default::default()
                    },
                    spec: Some(ServiceSpec {
                        cluster_ip: Some(cluster_ip),
                        ..Default::default()
                    }),
                    ..Default::default()
                });
            }
            ResourceKind::Route => {
                let host = object.data["spec"]["host"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}.apps.mock.example.com", name));
                let labels = object.metadata.labels.clone().unwrap_or_default();
                state.routes.push((labels, host));
            }
            _ => {}
        }

        state.resources.entry(kind).or_default().insert(name);
    }
}

#[async_trait::async_trait]
impl ControlPlane for MockControlPlane {
    fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        self.record("list_nodes")?;
        Ok(self.state.lock().unwrap().nodes.clone())
    }

    async fn console_url(&self) -> Result<Option<String>, ClientError> {
        self.record("console_url")?;
        Ok(self.state.lock().unwrap().console_url.clone())
    }

    async fn current_user(&self) -> Result<String, ClientError> {
        self.record("current_user")?;
        Ok(self.state.lock().unwrap().user.clone())
    }

    async fn create_project(&self, request: &ProjectRequest) -> Result<(), ClientError> {
        self.record("create_project")?;
        let mut state = self.state.lock().unwrap();
        if !state.projects.insert(request.name.clone()) {
            return Err(ClientError::Api(format!("project {} already exists", request.name)));
        }
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<String>, ClientError> {
        self.record("list_projects")?;
        Ok(self.state.lock().unwrap().projects.iter().cloned().collect())
    }

    async fn delete_project(&self, name: &str) -> Result<bool, ClientError> {
        self.record("delete_project")?;
        let mut state = self.state.lock().unwrap();
        if !state.projects.contains(name) {
            return Err(ClientError::NotFound(format!("project {}", name)));
        }
        if !state.ignore_deletes {
            state.projects.remove(name);
            state.resources.clear();
            state.services.clear();
            state.routes.clear();
        }
        Ok(true)
    }

    async fn create_objects(&self, _namespace: &str, objects: &[DynamicObject]) -> Result<(), ClientError> {
        self.record("create_objects")?;
        let mut state = self.state.lock().unwrap();
        for object in objects {
            Self::store(&mut state, object);
        }
        Ok(())
    }

    async fn process_template(
        &self,
        _namespace: &str,
        template: &DynamicObject,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, ClientError> {
        self.record("process_template")?;
        let mut rendered = serde_json::to_string(&template.data["objects"])?;
        for (name, value) in parameters {
            rendered = rendered.replace(&format!("${{{}}}", name), value);
        }
        let objects: Option<Vec<DynamicObject>> = serde_json::from_str(&rendered)?;
        Ok(objects.unwrap_or_default())
    }

    async fn list_names(&self, _namespace: &str, kind: ResourceKind) -> Result<Vec<String>, ClientError> {
        self.record("list_names")?;
        Ok(self.resource_names(kind))
    }

    async fn list_services(&self, _namespace: &str) -> Result<Vec<Service>, ClientError> {
        self.record("list_services")?;
        Ok(self.state.lock().unwrap().services.clone())
    }

    async fn list_pods(&self, _namespace: &str) -> Result<Vec<Pod>, ClientError> {
        self.record("list_pods")?;
        Ok(self.state.lock().unwrap().pods.clone())
    }

    async fn pod_log(&self, _namespace: &str, pod: &str) -> Result<String, ClientError> {
        self.record("pod_log")?;
        self.state
            .lock()
            .unwrap()
            .logs
            .get(pod)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("pod {}", pod)))
    }

    async fn route_hosts(&self, _namespace: &str, label_selector: &str) -> Result<Vec<String>, ClientError> {
        self.record("route_hosts")?;
        let (key, value) = label_selector.split_once('=').unwrap_or((label_selector, ""));
        Ok(self
            .state
            .lock()
            .unwrap()
            .routes
            .iter()
            .filter(|(labels, _)| labels.get(key).map(String::as_str) == Some(value))
            .map(|(_, host)| host.clone())
            .collect())
    }
}
