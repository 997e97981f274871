//! OpenShift control-plane client
//!
//! Implements [`ControlPlane`] on top of `kube`. Core resources use the typed
//! `k8s-openapi` structs; OpenShift resources (projects, routes, builds,
//! templates, consoles, users) go through `DynamicObject` with a pinned
//! `ApiResource`.

use crate::client_trait::{ControlPlane, ControlPlaneConnector};
use crate::error::ClientError;
use crate::kubeconfig;
use crate::manifest::group_version;
use crate::models::*;
use k8s_openapi::api::core::v1::{Node, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, LogParams, PostParams};
use kube::config::KubeConfigOptions;
use kube::core::GroupVersionKind;
use kube::discovery::{self, ApiResource, Scope};
use kube::{Client, Config};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

fn openshift_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

fn projects() -> ApiResource {
    openshift_resource("project.openshift.io", "v1", "Project", "projects")
}

fn users() -> ApiResource {
    openshift_resource("user.openshift.io", "v1", "User", "users")
}

fn consoles() -> ApiResource {
    openshift_resource("config.openshift.io", "v1", "Console", "consoles")
}

fn processed_templates() -> ApiResource {
    openshift_resource("template.openshift.io", "v1", "Template", "processedtemplates")
}

fn resource_for(kind: ResourceKind) -> ApiResource {
    match kind {
        ResourceKind::Service => ApiResource::erase::<Service>(&()),
        ResourceKind::PersistentVolumeClaim => ApiResource::erase::<PersistentVolumeClaim>(&()),
        ResourceKind::DeploymentConfig => {
            openshift_resource("apps.openshift.io", "v1", "DeploymentConfig", "deploymentconfigs")
        }
        ResourceKind::Route => openshift_resource("route.openshift.io", "v1", "Route", "routes"),
        ResourceKind::BuildConfig => {
            openshift_resource("build.openshift.io", "v1", "BuildConfig", "buildconfigs")
        }
        ResourceKind::ImageStream => {
            openshift_resource("image.openshift.io", "v1", "ImageStream", "imagestreams")
        }
    }
}

fn names(objects: Vec<DynamicObject>) -> Vec<String> {
    objects
        .into_iter()
        .filter_map(|object| object.metadata.name)
        .collect()
}

/// Control-plane client for one kubeconfig context.
#[derive(Clone)]
pub struct OpenShiftClient {
    client: Client,
    api_url: String,
}

impl OpenShiftClient {
    /// Build a client for `context` from raw kubeconfig contents.
    ///
    /// # Arguments
    /// * `kubeconfig` - Raw kubeconfig YAML
    /// * `context` - Name of the context to connect with
    pub async fn from_kubeconfig(kubeconfig: &str, context: &str) -> Result<Self, ClientError> {
        let parsed = kubeconfig::parse(kubeconfig)?;
        let api_url = kubeconfig::context_server(kubeconfig, context)?;

        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let mut config = Config::from_custom_kubeconfig(parsed, &options).await?;
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)?;
        debug!("Connected context {} to {}", context, api_url);

        Ok(Self { client, api_url })
    }

    fn dynamic(&self, namespace: &str, resource: &ApiResource) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, resource)
    }

    fn cluster_dynamic(&self, resource: &ApiResource) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), resource)
    }

    async fn create_object(&self, namespace: &str, object: &DynamicObject) -> Result<(), ClientError> {
        let types = object.types.as_ref().ok_or_else(|| {
            ClientError::Api(format!(
                "object {} has no apiVersion/kind",
                object.metadata.name.as_deref().unwrap_or("<unknown>")
            ))
        })?;
        let (group, version) = group_version(&types.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &types.kind);
        let (resource, capabilities) = discovery::pinned_kind(&self.client, &gvk).await?;

        let api = if capabilities.scope == Scope::Cluster {
            self.cluster_dynamic(&resource)
        } else {
            self.dynamic(namespace, &resource)
        };

        debug!(
            "Creating {} {} in {}",
            types.kind,
            object.metadata.name.as_deref().unwrap_or("<generated>"),
            namespace
        );
        api.create(&PostParams::default(), object).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ControlPlane for OpenShiftClient {
    fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        Ok(nodes.list(&ListParams::default()).await?.items)
    }

    async fn console_url(&self) -> Result<Option<String>, ClientError> {
        let consoles = self.cluster_dynamic(&consoles()).list(&ListParams::default()).await?;
        Ok(consoles.items.into_iter().find_map(|console| {
            console.data["status"]["consoleURL"]
                .as_str()
                .map(str::to_string)
        }))
    }

    async fn current_user(&self) -> Result<String, ClientError> {
        let user = self.cluster_dynamic(&users()).get("~").await?;
        user.metadata
            .name
            .ok_or_else(|| ClientError::Api("current user has no name".to_string()))
    }

    async fn create_project(&self, request: &ProjectRequest) -> Result<(), ClientError> {
        let mut annotations = BTreeMap::new();
        annotations.insert("openshift.io/display-name".to_string(), request.display_name.clone());
        annotations.insert("openshift.io/description".to_string(), request.description.clone());
        annotations.insert("openshift.io/requester".to_string(), request.requester.clone());

        let mut project = DynamicObject::new(&request.name, &projects());
        project.metadata.annotations = Some(annotations);
        self.cluster_dynamic(&projects())
            .create(&PostParams::default(), &project)
            .await?;

        let binding = RoleBinding {
            metadata: ObjectMeta {
                name: Some("admin".to_string()),
                namespace: Some(request.name.clone()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: "admin".to_string(),
            },
            subjects: Some(vec![Subject {
                api_group: Some("rbac.authorization.k8s.io".to_string()),
                kind: "User".to_string(),
                name: request.requester.clone(),
                namespace: None,
            }]),
        };
        let bindings: Api<RoleBinding> = Api::namespaced(self.client.clone(), &request.name);
        bindings.create(&PostParams::default(), &binding).await?;

        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<String>, ClientError> {
        let projects = self.cluster_dynamic(&projects()).list(&ListParams::default()).await?;
        Ok(names(projects.items))
    }

    async fn delete_project(&self, name: &str) -> Result<bool, ClientError> {
        self.cluster_dynamic(&projects())
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(true)
    }

    async fn create_objects(&self, namespace: &str, objects: &[DynamicObject]) -> Result<(), ClientError> {
        for object in objects {
            self.create_object(namespace, object).await?;
        }
        Ok(())
    }

    async fn process_template(
        &self,
        namespace: &str,
        template: &DynamicObject,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, ClientError> {
        let mut template = template.clone();
        template.metadata.namespace = Some(namespace.to_string());
        let declared = template
            .data
            .get_mut("parameters")
            .and_then(|declared| declared.as_array_mut());
        for parameter in declared.into_iter().flatten() {
            let Some(parameter) = parameter.as_object_mut() else {
                continue;
            };
            let value = parameter
                .get("name")
                .and_then(|name| name.as_str())
                .and_then(|name| parameters.get(name))
                .cloned();
            if let Some(value) = value {
                parameter.insert("value".to_string(), serde_json::Value::String(value));
            }
        }

        let processed = self
            .dynamic(namespace, &processed_templates())
            .create(&PostParams::default(), &template)
            .await?;

        let objects = processed.data["objects"].as_array().cloned().unwrap_or_default();
        objects
            .into_iter()
            .map(|object| serde_json::from_value(object).map_err(ClientError::from))
            .collect()
    }

    async fn list_names(&self, namespace: &str, kind: ResourceKind) -> Result<Vec<String>, ClientError> {
        let objects = self
            .dynamic(namespace, &resource_for(kind))
            .list(&ListParams::default())
            .await?;
        Ok(names(objects.items))
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, ClientError> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(services.list(&ListParams::default()).await?.items)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClientError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.list(&ListParams::default()).await?.items)
    }

    async fn pod_log(&self, namespace: &str, pod: &str) -> Result<String, ClientError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.logs(pod, &LogParams::default()).await?)
    }

    async fn route_hosts(&self, namespace: &str, label_selector: &str) -> Result<Vec<String>, ClientError> {
        let routes = self
            .dynamic(namespace, &resource_for(ResourceKind::Route))
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(routes
            .items
            .into_iter()
            .filter_map(|route| route.data["spec"]["host"].as_str().map(str::to_string))
            .collect())
    }
}

/// Connector producing [`OpenShiftClient`]s.
#[derive(Debug, Clone, Default)]
pub struct KubeConnector;

impl KubeConnector {
    /// Connector using `kube::Config` from each document
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ControlPlaneConnector for KubeConnector {
    async fn connect(&self, kubeconfig: &str, context: &str) -> Result<Arc<dyn ControlPlane>, ClientError> {
        let client = OpenShiftClient::from_kubeconfig(kubeconfig, context).await?;
        Ok(Arc::new(client))
    }
}
