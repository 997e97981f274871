//! Mock collaborators for unit testing
//!
//! In-memory implementations of the client traits so monitoring jobs can be
//! tested without a cluster or network:
//! - `control_plane.rs` - [`MockControlPlane`], a single-namespace cluster model
//! - `connector.rs` - [`MockConnector`], hands out control planes keyed by API URL
//! - `http.rs` - [`MockHttpClient`], canned responses keyed by method and URL

mod connector;
mod control_plane;
mod http;

pub use connector::MockConnector;
pub use control_plane::MockControlPlane;
pub use http::MockHttpClient;
