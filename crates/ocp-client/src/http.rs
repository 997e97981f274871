//! Generic HTTP client
//!
//! Used for fetching kubeconfig documents and manifests, probing consoles and
//! exercising the synthetic sample application. Cluster-hosted endpoints are
//! frequently served with self-signed certificates, so certificate validation
//! is disabled.

use crate::client_trait::HttpClient;
use crate::error::ClientError;
use crate::models::{HttpMethod, HttpRequest, HttpResponse};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Client with a 30s timeout that accepts self-signed certificates
    pub fn new() -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        debug!("{} {}", request.method, request.url);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(HttpResponse { status, body })
    }
}
