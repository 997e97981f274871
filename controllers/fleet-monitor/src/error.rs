//! Monitor-specific error types.
//!
//! Job code never lets these escape a cycle: they are logged and turned into
//! metric values. Only startup (configuration, listener binding) propagates
//! them out of `main`.

use ocp_client::ClientError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the fleet monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Control-plane or HTTP collaborator error
    #[error("Cluster client error: {0}")]
    Client(#[from] ClientError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A bounded poll did not observe the expected state in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Metric registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Listener or properties file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Properties file could not be parsed
    #[error("Properties file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Query surface failed
    #[error("Server error: {0}")]
    Server(String),
}
