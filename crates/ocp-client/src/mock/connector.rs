//! Mock connector
//!
//! Resolves the context's API server URL from the kubeconfig exactly like the
//! real connector, then hands out a shared [`MockControlPlane`] for that URL.

use super::MockControlPlane;
use crate::client_trait::{ControlPlane, ControlPlaneConnector};
use crate::error::ClientError;
use crate::kubeconfig;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
/// Mock connector handing out one shared `MockControlPlane` per API URL
pub struct MockConnector {
    planes: Arc<Mutex<HashMap<String, MockControlPlane>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    connects: Arc<Mutex<usize>>,
}

impl MockConnector {
    /// Connector with no clusters yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Control plane served for `api_url`, created on first use.
    ///
    /// Tests call this before connecting to seed nodes, pods and failures.
    pub fn control_plane(&self, api_url: &str) -> MockControlPlane {
        self.planes
            .lock()
            .unwrap()
            .entry(api_url.to_string())
            .or_insert_with(|| MockControlPlane::new(api_url))
            .clone()
    }

    /// Refuse connections for `context`
    pub fn fail_context(&self, context: &str) {
        self.failing.lock().unwrap().insert(context.to_string());
    }

    /// Number of successful connections handed out
    pub fn connect_count(&self) -> usize {
        *self.connects.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ControlPlaneConnector for MockConnector {
    async fn connect(&self, kubeconfig: &str, context: &str) -> Result<Arc<dyn ControlPlane>, ClientError> {
        if self.failing.lock().unwrap().contains(context) {
            return Err(ClientError::Api(format!("mock connection refused for context {}", context)));
        }
        let api_url = kubeconfig::context_server(kubeconfig, context)?;
        let plane = self.control_plane(&api_url);
        *self.connects.lock().unwrap() += 1;
        Ok(Arc::new(plane))
    }
}
