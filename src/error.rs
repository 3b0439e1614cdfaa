//! Error type shared by the transport, the session and the business calls.

use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Required settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Primary login was rejected, or the login server could not be reached.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The refresh flow failed. The stored credential is left untouched.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Every attempt ended with a transient status (502, 503, 504).
    #[error("Server unavailable: HTTP {} after {attempts} attempts", .status.as_u16())]
    TransientTransport {
        status: StatusCode,
        attempts: usize,
        body: String,
    },

    /// No connection could be established at all.
    #[error("Cannot connect to {url}")]
    NetworkUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A response was received but its body is not JSON.
    #[error("Invalid response (HTTP {}): {body}", .status.as_u16())]
    InvalidResponse { status: StatusCode, body: String },

    /// The caller asked for something the service cannot accept.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
