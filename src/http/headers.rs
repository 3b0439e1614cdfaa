//! Static headers the service's web front-end sends with every request.

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
    InvalidHeaderValue,
};

pub const SITE_URL: &str = "https://lknpd.nalog.ru";

/// Page the login request is sent from.
pub const LOGIN_PAGE: &str = "/";
/// Page the token refresh is sent from.
pub const SALES_PAGE: &str = "/sales";
/// Page business calls are sent from.
pub const SALES_CREATE_PAGE: &str = "/sales/create";

const REFERRER: HeaderName = HeaderName::from_static("referrer");
const REFERRER_POLICY: HeaderName = HeaderName::from_static("referrerpolicy");

pub fn service_headers(page: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(referrer) = HeaderValue::from_str(&format!("{}{}", SITE_URL, page)) {
        headers.insert(REFERRER, referrer);
    }
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers
}

/// Adds `authorization: Bearer <token>`, marked sensitive.
pub fn with_bearer(
    mut headers: HeaderMap,
    token: &str,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Shortens a token for log output.
pub fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
