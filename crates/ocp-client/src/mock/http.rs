//! Mock HTTP client with canned responses

use crate::client_trait::HttpClient;
use crate::error::ClientError;
use crate::models::{HttpMethod, HttpRequest, HttpResponse};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Key = (HttpMethod, String);

/// Unregistered requests fail as if the host were unreachable.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<Key, Result<HttpResponse, String>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockHttpClient {
    /// Client with no canned responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with `status` and `body`
    pub fn respond(&self, method: HttpMethod, url: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert((method, url.to_string()), Ok(HttpResponse::new(status, body)));
    }

    /// Answer `GET url` with `status` and `body`
    pub fn respond_get(&self, url: &str, status: u16, body: &str) {
        self.respond(HttpMethod::Get, url, status, body);
    }

    /// Fail requests to `url` with a transport error
    pub fn fail(&self, method: HttpMethod, url: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert((method, url.to_string()), Err(format!("mock transport error for {}", url)));
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// How many times `method url` was requested
    pub fn request_count(&self, method: HttpMethod, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttpClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let key = (request.method, request.url.clone());
        self.requests.lock().unwrap().push(request);

        match self.responses.lock().unwrap().get(&key) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(ClientError::Api(message.clone())),
            None => Err(ClientError::Api(format!("connection refused: {}", key.1))),
        }
    }
}
