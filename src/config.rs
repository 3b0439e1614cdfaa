use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::DEFAULT_TIMEOUT;

pub const DEFAULT_API_URL: &str = "https://lknpd.nalog.ru/api/v1";

/// Settings a [`Session`](crate::Session) is constructed with.
///
/// Username and password are constructor parameters; everything else has a
/// default that can be overridden by chaining.
#[derive(Clone)]
pub struct SessionConfig {
    username: String,
    password: String,
    api_url: String,
    timeout: Duration,
    autologin: bool,
}

impl SessionConfig {
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the username or password is empty.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(Error::Configuration("username is required".to_string()));
        }
        if password.is_empty() {
            return Err(Error::Configuration("password is required".to_string()));
        }
        Ok(Self {
            username,
            password,
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            autologin: false,
        })
    }

    /// Override the API base URL. A trailing slash is dropped.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log in as soon as the session is opened instead of on the first call.
    #[must_use]
    pub fn with_autologin(mut self, autologin: bool) -> Self {
        self.autologin = autologin;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn autologin(&self) -> bool {
        self.autologin
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_url, endpoint.trim_start_matches('/'))
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .field("autologin", &self.autologin)
            .finish()
    }
}
