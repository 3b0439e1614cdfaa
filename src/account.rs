//! Read-only account queries.

use serde_json::Value;

use crate::clock::Clock;
use crate::error::Result;
use crate::http::Transport;
use crate::session::Session;

pub const USER_ENDPOINT: &str = "user";
pub const PAYMENT_KEYS_ENDPOINT: &str = "keys";

/// Taxpayer profile as the service reports it.
#[tracing::instrument(skip(session))]
pub async fn user_info<T: Transport, C: Clock>(session: &mut Session<T, C>) -> Result<Value> {
    session.call(USER_ENDPOINT, None).await
}

/// Payment details (bank requisites) for the tax due.
#[tracing::instrument(skip(session))]
pub async fn payment_keys<T: Transport, C: Clock>(session: &mut Session<T, C>) -> Result<Value> {
    session.call(PAYMENT_KEYS_ENDPOINT, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::SessionConfig;
    use crate::http::{ApiResponse, MockTransport};
    use serde_json::json;

    fn session(transport: MockTransport) -> Session<MockTransport, SystemClock> {
        let config = SessionConfig::new("123", "secret")
            .unwrap()
            .with_api_url("https://api.test/v1");
        Session::with_parts(config, transport, SystemClock)
    }

    fn expect_login(transport: &mut MockTransport) {
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/auth/lkfl"))
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::ok(json!({
                    "token": "A",
                    "tokenExpireIn": "2999-01-01T00:00:00.000Z",
                    "refreshToken": "R1",
                    "profile": {"inn": "123"}
                })))
            });
    }

    #[tokio::test]
    async fn test_user_info_gets_user_endpoint() {
        let mut transport = MockTransport::new();
        expect_login(&mut transport);
        transport
            .expect_send()
            .withf(|req| req.url == "https://api.test/v1/user" && req.method() == "GET")
            .times(1)
            .returning(|_| Ok(ApiResponse::ok(json!({"inn": "123", "displayName": "Ivan"}))));

        let mut session = session(transport);
        let info = user_info(&mut session).await.unwrap();
        assert_eq!(info["displayName"], "Ivan");
    }

    #[tokio::test]
    async fn test_payment_keys_reuses_session_login() {
        let mut transport = MockTransport::new();
        expect_login(&mut transport);
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/user"))
            .times(1)
            .returning(|_| Ok(ApiResponse::ok(json!({}))));
        transport
            .expect_send()
            .withf(|req| req.url == "https://api.test/v1/keys" && req.method() == "GET")
            .times(1)
            .returning(|_| Ok(ApiResponse::ok(json!([{"bik": "044525225"}]))));

        let mut session = session(transport);
        user_info(&mut session).await.unwrap();
        let keys = payment_keys(&mut session).await.unwrap();
        assert_eq!(keys[0]["bik"], "044525225");
    }
}
