//! Control-plane client errors

use thiserror::Error;

/// Errors that can occur when talking to a cluster or an HTTP endpoint
#[derive(Debug, Error)]
pub enum ClientError {
    /// Kubernetes API request/response error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig document could not be parsed or resolved
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML manifest could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Control plane returned something unusable
    #[error("API error: {0}")]
    Api(String),
}
