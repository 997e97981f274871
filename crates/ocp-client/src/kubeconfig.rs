//! Kubeconfig document helpers
//!
//! A fetched kubeconfig is only trusted once it parses; these helpers are the
//! single place that decides what "parses" means.

use crate::error::ClientError;
use kube::config::Kubeconfig;

/// Parse a raw kubeconfig document.
///
/// Every `Kubeconfig` field is optional, so any YAML or JSON mapping would
/// deserialize. A document is only accepted when it declares itself a
/// kubeconfig (`kind: Config` or an `apiVersion` with no other kind) and lists
/// at least one context or cluster. An empty body or an API error object is
/// rejected rather than read as a kubeconfig with zero contexts.
pub fn parse(contents: &str) -> Result<Kubeconfig, ClientError> {
    if contents.trim().is_empty() {
        return Err(ClientError::Api("empty kubeconfig document".to_string()));
    }
    let kubeconfig = Kubeconfig::from_yaml(contents)?;

    match kubeconfig.kind.as_deref() {
        Some("Config") => {}
        None if kubeconfig.api_version.is_some() => {}
        Some(kind) => {
            return Err(ClientError::Api(format!("document of kind {} is not a kubeconfig", kind)));
        }
        None => {
            return Err(ClientError::Api("document has neither kind nor apiVersion".to_string()));
        }
    }
    if kubeconfig.contexts.is_empty() && kubeconfig.clusters.is_empty() {
        return Err(ClientError::Api("kubeconfig lists no contexts or clusters".to_string()));
    }

    Ok(kubeconfig)
}

/// Names of all contexts in document order
pub fn context_names(contents: &str) -> Result<Vec<String>, ClientError> {
    Ok(parse(contents)?
        .contexts
        .into_iter()
        .map(|ctx| ctx.name)
        .collect())
}

/// API server URL of the cluster a context points at, without a trailing `/`.
pub fn context_server(contents: &str, context: &str) -> Result<String, ClientError> {
    let kubeconfig = parse(contents)?;

    let cluster_name = kubeconfig
        .contexts
        .iter()
        .find(|ctx| ctx.name == context)
        .and_then(|ctx| ctx.context.as_ref())
        .map(|ctx| ctx.cluster.clone())
        .ok_or_else(|| ClientError::NotFound(format!("context {} not found in kubeconfig", context)))?;

    let server = kubeconfig
        .clusters
        .iter()
        .find(|cluster| cluster.name == cluster_name)
        .and_then(|cluster| cluster.cluster.as_ref())
        .and_then(|cluster| cluster.server.clone())
        .ok_or_else(|| {
            ClientError::NotFound(format!(
                "cluster {} referenced by context {} has no server",
                cluster_name, context
            ))
        })?;

    Ok(server.trim_end_matches('/').to_string())
}
