//! OpenShift Control-Plane Client
//!
//! Collaborators used by the fleet monitor to talk to the clusters it watches
//! and to the outside world:
//!
//! - [`ControlPlane`]: list/create/delete cluster resources, read pod logs and
//!   resolve the current identity, for a single cluster context.
//! - [`ControlPlaneConnector`]: builds a [`ControlPlane`] from the raw contents
//!   of a kubeconfig document and a context name.
//! - [`HttpClient`]: plain HTTP GET/POST returning status code and body.
//!
//! # Example
//!
//! ```no_run
//! use ocp_client::{ControlPlaneConnector, KubeConnector};
//!
//! # async fn example(kubeconfig: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let connector = KubeConnector::new();
//! let cluster = connector.connect(kubeconfig, "prod-a").await?;
//!
//! let nodes = cluster.list_nodes().await?;
//! println!("{} has {} nodes", cluster.api_url(), nodes.len());
//! # Ok(())
//! # }
//! ```
//!
//! The `test-util` feature exposes in-memory mocks of every trait so the
//! monitoring jobs can be exercised without a cluster.

/// kube-backed [`ControlPlane`] and connector
pub mod client;
/// Client error types
pub mod error;
/// reqwest-backed [`HttpClient`]
pub mod http;
/// Kubeconfig parsing and context lookup
pub mod kubeconfig;
/// YAML manifests to dynamic objects
pub mod manifest;
/// Request and response models
pub mod models;
/// Collaborator traits
#[path = "trait.rs"]
pub mod client_trait;
/// In-memory collaborators for tests
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{KubeConnector, OpenShiftClient};
pub use client_trait::{ControlPlane, ControlPlaneConnector, HttpClient};
pub use error::ClientError;
pub use http::ReqwestHttpClient;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{MockConnector, MockControlPlane, MockHttpClient};

// Resource types exchanged through the traits
pub use k8s_openapi::api::core::v1::{Node, Pod, Service};
pub use kube::api::DynamicObject;
