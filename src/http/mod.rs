//! HTTP transport with retry logic and the service's static headers.

mod client;
pub mod headers;
mod retry;

#[cfg(test)]
pub use client::MockTransport;
pub use client::{ApiRequest, ApiResponse, DEFAULT_TIMEOUT, HttpClient, Transport};
pub use retry::{INITIAL_BACKOFF_MS, MAX_ATTEMPTS, RetryPolicy, TRANSIENT_STATUSES};
