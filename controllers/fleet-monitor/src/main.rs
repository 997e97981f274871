//! Fleet Monitor
//!
//! Watches a fleet of OpenShift clusters listed in remote kubeconfig
//! documents and publishes per-cluster health gauges:
//! - node counts and node readiness
//! - web console reachability
//! - an hourly synthetic deploy of a sample application
//!
//! The working clusters and the gauges are served over HTTP.

mod api;
mod cluster;
mod config;
mod controller;
mod error;
mod jobs;
mod metrics;
mod scheduler;
#[cfg(test)]
mod test_utils;
mod wait;

use crate::config::{Configuration, PropertySource};
use crate::error::MonitorError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    // rustls 0.23 needs a process-wide provider when more than one is linked
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Fleet Monitor");

    let config = Configuration::new(PropertySource::load()?);
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
