//! Request/response models shared by the client traits

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespaced resource kinds the synthetic deploy check inspects by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// `v1/Service`
    Service,
    /// `v1/PersistentVolumeClaim`
    PersistentVolumeClaim,
    /// `apps.openshift.io/v1/DeploymentConfig`
    DeploymentConfig,
    /// `route.openshift.io/v1/Route`
    Route,
    /// `build.openshift.io/v1/BuildConfig`
    BuildConfig,
    /// `image.openshift.io/v1/ImageStream`
    ImageStream,
}

impl ResourceKind {
    /// Object `kind` as it appears in manifests
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceKind::Service => "Service",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::DeploymentConfig => "DeploymentConfig",
            ResourceKind::Route => "Route",
            ResourceKind::BuildConfig => "BuildConfig",
            ResourceKind::ImageStream => "ImageStream",
        }
    }

    /// Look up a kind by its manifest name
    pub fn from_kind(kind: &str) -> Option<Self> {
        [
            ResourceKind::Service,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::DeploymentConfig,
            ResourceKind::Route,
            ResourceKind::BuildConfig,
            ResourceKind::ImageStream,
        ]
        .into_iter()
        .find(|k| k.kind() == kind)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Parameters for creating a project owned by the monitoring identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRequest {
    /// Project (namespace) name
    pub name: String,
    /// Name shown in the console
    pub display_name: String,
    /// Project description
    pub description: String,
    /// User granted admin on the new project
    pub requester: String,
}

/// HTTP method supported by [`crate::HttpClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// Outbound HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Header pairs in send order
    pub headers: Vec<(String, String)>,
    /// Text body, sent as-is
    pub body: Option<String>,
}

impl HttpRequest {
    /// GET without body
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// POST with a text body
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status code and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl HttpResponse {
    /// Response with a status and text body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
