//! Credential lifecycle: primary login, refresh and authenticated calls.
//!
//! A [`Session`] owns at most one [`Credential`]. Every authenticated call goes
//! through [`Session::ensure_credential`], which reuses a valid access token,
//! refreshes a stale one, or performs primary login when no refresh token is
//! held. Methods that may touch the credential take `&mut self`, so a session
//! shared between tasks must sit behind a lock.

mod credential;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::device::DeviceIdentity;
use crate::error::{Error, Result};
use crate::http::headers::{self, LOGIN_PAGE, SALES_CREATE_PAGE, SALES_PAGE};
use crate::http::{ApiRequest, ApiResponse, HttpClient, Transport};

pub use credential::{Credential, CredentialState};
use credential::{LoginGrant, LoginRequest, RefreshGrant, RefreshRequest};

pub const LOGIN_ENDPOINT: &str = "auth/lkfl";
pub const REFRESH_ENDPOINT: &str = "auth/token";

pub struct Session<T = HttpClient, C = SystemClock> {
    config: SessionConfig,
    device: DeviceIdentity,
    transport: T,
    clock: C,
    credential: Credential,
}

impl Session {
    /// Creates a session over a real HTTP client. No request is made.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport = HttpClient::with_timeout(config.timeout())?;
        Ok(Self::with_parts(config, transport, SystemClock))
    }

    /// Creates a session and, if the config asks for it, logs in right away.
    #[tracing::instrument(skip(config))]
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let mut session = Self::new(config)?;
        if session.config.autologin() {
            session.login().await?;
        }
        Ok(session)
    }
}

impl<T: Transport, C: Clock> Session<T, C> {
    pub fn with_parts(config: SessionConfig, transport: T, clock: C) -> Self {
        Self {
            config,
            device: DeviceIdentity::generate(),
            transport,
            clock,
            credential: Credential::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.credential.owner_id()
    }

    /// Current instant according to the session's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Drops the credential; the next call performs primary login.
    pub fn reset(&mut self) {
        debug!("Discarding credential for {}", self.config.username());
        self.credential = Credential::default();
    }

    /// Returns an access token that is valid at the time of the check.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when primary login fails, [`Error::Refresh`]
    /// when a stale token cannot be renewed. A failed refresh does not fall
    /// back to primary login; call [`Session::reset`] to force one.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_credential(&mut self) -> Result<String> {
        match self.credential.state(self.clock.now()) {
            CredentialState::Valid => {}
            CredentialState::Absent => self.login().await?,
            CredentialState::Stale => self.refresh().await?,
        }

        self.credential
            .access_token()
            .map(str::to_string)
            .ok_or_else(|| Error::Authentication("no access token was issued".to_string()))
    }

    /// Primary login with username and password, replacing any credential.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when the server refuses the credentials, the
    /// server cannot be reached, or it does not answer within the timeout.
    /// [`Error::TransientTransport`] when it keeps answering 502/503/504.
    #[tracing::instrument(skip(self))]
    pub async fn login(&mut self) -> Result<()> {
        info!("Logging in as {}...", self.config.username());

        let payload = serde_json::to_value(LoginRequest {
            username: self.config.username(),
            password: self.config.password(),
            device_info: &self.device,
        })?;
        let request = ApiRequest::post(
            self.config.endpoint_url(LOGIN_ENDPOINT),
            headers::service_headers(LOGIN_PAGE),
            payload,
        );

        let response = self.transport.send(request).await.map_err(|e| match e {
            Error::NetworkUnavailable { url, .. } => Error::Authentication(format!(
                "cannot connect to authentication server {}",
                url
            )),
            Error::Http(source) if source.is_timeout() => Error::Authentication(format!(
                "authentication server did not respond: {}",
                source
            )),
            other => other,
        })?;

        let has_refresh_token = response
            .body
            .get("refreshToken")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty());
        if !has_refresh_token {
            return Err(Error::Authentication(rejection_reason(&response)));
        }

        let grant: LoginGrant = serde_json::from_value(response.body).map_err(|e| {
            Error::Authentication(format!("unexpected login response: {}", e))
        })?;
        self.credential.apply_login(grant);

        debug!(
            "Logged in, token {} valid until {:?}",
            headers::mask(self.credential.access_token().unwrap_or_default()),
            self.credential.expires_at()
        );
        Ok(())
    }

    /// Renews the access token with the stored refresh token.
    #[tracing::instrument(skip(self))]
    async fn refresh(&mut self) -> Result<()> {
        let refresh_token = self
            .credential
            .refresh_token()
            .ok_or_else(|| Error::Refresh("no refresh token held".to_string()))?;
        debug!("Refreshing access token...");

        let payload = serde_json::to_value(RefreshRequest {
            device_info: &self.device,
            refresh_token,
        })?;
        let request = ApiRequest::post(
            self.config.endpoint_url(REFRESH_ENDPOINT),
            headers::service_headers(SALES_PAGE),
            payload,
        );

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| Error::Refresh(e.to_string()))?;

        let grant: RefreshGrant = serde_json::from_value(response.body.clone()).map_err(|_| {
            Error::Refresh(format!(
                "HTTP {}: {}",
                response.status.as_u16(),
                rejection_reason(&response)
            ))
        })?;
        self.credential.apply_refresh(grant);

        debug!(
            "Token refreshed, valid until {:?}",
            self.credential.expires_at()
        );
        Ok(())
    }

    /// Issues an authenticated request to `{api_url}/{endpoint}`.
    ///
    /// GET without a payload, POST with one. The decoded body is returned for
    /// any status; the server reports business failures inside the body.
    /// An HTTP 401 triggers one renewal of the access token and one re-issue.
    #[tracing::instrument(skip(self, payload))]
    pub async fn call(&mut self, endpoint: &str, payload: Option<Value>) -> Result<Value> {
        let response = self.send_authorized(endpoint, payload.clone()).await?;

        if response.status == StatusCode::UNAUTHORIZED
            && self.credential.refresh_token().is_some()
        {
            warn!(
                "{}: access token rejected, renewing it and retrying once",
                endpoint
            );
            self.credential.expire();
            let response = self.send_authorized(endpoint, payload).await?;
            return Ok(response.body);
        }

        Ok(response.body)
    }

    async fn send_authorized(
        &mut self,
        endpoint: &str,
        payload: Option<Value>,
    ) -> Result<ApiResponse> {
        let token = self.ensure_credential().await?;
        let headers = headers::with_bearer(headers::service_headers(SALES_CREATE_PAGE), &token)
            .map_err(|e| Error::Authentication(format!("unusable access token: {}", e)))?;

        let url = self.config.endpoint_url(endpoint);
        let request = match payload {
            Some(payload) => ApiRequest::post(url, headers, payload),
            None => ApiRequest::get(url, headers),
        };
        self.transport.send(request).await
    }
}

/// Server's explanation for a refused request, or the raw body.
fn rejection_reason(response: &ApiResponse) -> String {
    response
        .body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| response.body.to_string())
}
