//! JSON-over-HTTPS transport with bounded retry on transient statuses.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::retry::RetryPolicy;
use crate::error::{Error, Result};

/// Per-attempt timeout applied when no other is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One outbound exchange: GET when `payload` is `None`, POST otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub payload: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            url: url.into(),
            headers,
            payload: None,
        }
    }

    pub fn post(url: impl Into<String>, headers: HeaderMap, payload: Value) -> Self {
        Self {
            url: url.into(),
            headers,
            payload: Some(payload),
        }
    }

    pub fn method(&self) -> &'static str {
        if self.payload.is_some() { "POST" } else { "GET" }
    }
}

/// Decoded response. Error statuses are not faults at this level; the body
/// may still carry the server's explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// HTTP client with built-in retry logic for transient server failures.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    /// Builds a reqwest Client with the given per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client))
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Single attempt without retry.
    async fn send_once(&self, request: &ApiRequest) -> Result<Response> {
        let builder = match &request.payload {
            Some(payload) => self.client.post(&request.url).json(payload),
            None => self.client.get(&request.url),
        };

        builder
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|source| {
                if source.is_connect() {
                    Error::NetworkUnavailable {
                        url: request.url.clone(),
                        source,
                    }
                } else {
                    Error::Http(source)
                }
            })
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[tracing::instrument(skip(self, request), fields(method = request.method(), url = %request.url))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            let response = self.send_once(&request).await?;
            let status = response.status();

            if !self.policy.is_transient(status) {
                debug!("{} {} -> {}", request.method(), request.url, status);
                return decode(response).await;
            }

            if attempt >= max_attempts {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::TransientTransport {
                    status,
                    attempts: attempt,
                    body,
                });
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                "{} {}: attempt {}/{} got HTTP {}, retrying in {}ms...",
                request.method(),
                request.url,
                attempt,
                max_attempts,
                status.as_u16(),
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn decode(response: Response) -> Result<ApiResponse> {
    let status = response.status();
    let bytes = response.bytes().await?;

    match serde_json::from_slice(&bytes) {
        Ok(body) => Ok(ApiResponse { status, body }),
        Err(_) => Err(Error::InvalidResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }),
    }
}
