//! Client descriptor attached to every authentication request.

use rand::RngExt;
use serde::Serialize;

pub const DEVICE_ID_LEN: usize = 21;
pub const SOURCE_TYPE: &str = "WEB";
pub const APP_VERSION: &str = "1.0.0";
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_2_2) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.192 Safari/537.36";

/// Stable identity of this process, serialized as the `deviceInfo` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    source_device_id: String,
    source_type: &'static str,
    app_version: &'static str,
    meta_details: MetaDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetaDetails {
    user_agent: &'static str,
}

impl DeviceIdentity {
    /// Generates a fresh random device id.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..DEVICE_ID_LEN)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect::<String>();
        Self::with_device_id(id)
    }

    pub fn with_device_id(source_device_id: impl Into<String>) -> Self {
        Self {
            source_device_id: source_device_id.into(),
            source_type: SOURCE_TYPE,
            app_version: APP_VERSION,
            meta_details: MetaDetails {
                user_agent: USER_AGENT,
            },
        }
    }

    pub fn device_id(&self) -> &str {
        &self.source_device_id
    }
}
