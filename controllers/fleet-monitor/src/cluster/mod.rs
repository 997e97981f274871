//! Fleet state
//!
//! - [`FleetRegistry`]: kubeconfig URL -> [`KubeconfigSource`]
//! - [`KubeconfigSource`]: one fetched kubeconfig document and the clusters
//!   materialized from its contexts
//! - [`ClusterHandle`]: one cluster connection and its published gauges
//!
//! The registry owns sources and sources own handles. Jobs and the query
//! surface work on snapshots: cloned `Vec`s of shared handles.

mod handle;
mod registry;
mod source;

pub use handle::ClusterHandle;
pub use registry::FleetRegistry;
pub use source::KubeconfigSource;
