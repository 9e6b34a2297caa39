//! Scripted transport for unit tests. No network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::transport::{ApiResponse, PendingRequest, Transport};
use super::{ApiClient, ApiError};
use crate::auth::SessionStore;
use crate::config::Config;

type Handler = Box<dyn Fn(&PendingRequest) -> Result<ApiResponse, ApiError> + Send + Sync>;

/// Answers every request through `handler` and records what was sent.
pub(crate) struct MockTransport {
    handler: Handler,
    delays: Vec<(String, Duration)>,
    requests: Mutex<Vec<PendingRequest>>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&PendingRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delays: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Hold responses for URLs ending in `suffix`
    pub(crate) fn delay(mut self, suffix: &str, duration: Duration) -> Self {
        self.delays.push((suffix.to_string(), duration));
        self
    }

    pub(crate) fn requests(&self) -> Vec<PendingRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Number of requests sent to URLs ending in `suffix`
    pub(crate) fn count(&self, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &PendingRequest) -> Result<ApiResponse, ApiError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());

        let delay = self
            .delays
            .iter()
            .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        (self.handler)(request)
    }
}

pub(crate) fn respond(status: u16, body: serde_json::Value) -> Result<ApiResponse, ApiError> {
    let status = StatusCode::from_u16(status).expect("valid status");
    Ok(ApiResponse::new(status, body.to_string()))
}

pub(crate) fn test_config() -> Config {
    Config {
        timeout_ms: 5_000,
        debug: true,
        ..Config::default()
    }
}

pub(crate) fn test_client(transport: Arc<MockTransport>, session: SessionStore) -> ApiClient {
    ApiClient::with_transport(&test_config(), session, transport)
}
