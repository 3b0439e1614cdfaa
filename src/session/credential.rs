use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceIdentity;

/// Where the credential stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No refresh token: primary login is required.
    Absent,
    /// Access token usable as-is.
    Valid,
    /// Access token expired (or unusable) but a refresh token is held.
    Stale,
}

/// Authentication state held by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    refresh_token: Option<String>,
    owner_id: Option<String>,
}

impl Credential {
    /// The token is valid strictly before `expires_at`.
    pub fn state(&self, now: DateTime<Utc>) -> CredentialState {
        match (&self.access_token, self.expires_at) {
            (Some(_), Some(expires_at)) if now < expires_at => CredentialState::Valid,
            _ if self.refresh_token.is_none() => CredentialState::Absent,
            _ => CredentialState::Stale,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Taxpayer id returned by primary login.
    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub(crate) fn apply_login(&mut self, grant: LoginGrant) {
        self.access_token = Some(grant.token);
        self.expires_at = Some(grant.token_expire_in);
        self.refresh_token = Some(grant.refresh_token);
        self.owner_id = Some(grant.profile.inn);
    }

    pub(crate) fn apply_refresh(&mut self, grant: RefreshGrant) {
        self.access_token = Some(grant.token);
        self.expires_at = Some(grant.token_expire_in);
        if let Some(refresh_token) = grant.refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(refresh_token);
        }
    }

    /// Forces the next check to renew the access token.
    pub(crate) fn expire(&mut self) {
        self.expires_at = None;
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub device_info: &'a DeviceIdentity,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub device_info: &'a DeviceIdentity,
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginGrant {
    pub token: String,
    pub token_expire_in: DateTime<Utc>,
    pub refresh_token: String,
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Profile {
    pub inn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshGrant {
    pub token: String,
    pub token_expire_in: DateTime<Utc>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
