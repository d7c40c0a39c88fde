//! Session cookies.
//!
//! Every cookie is `HttpOnly; Path=/` plus the attributes of the configured
//! [`CookieMode`]. Clearing uses the same attributes with `Max-Age=0`.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::CookieMode;
use crate::error::ApiError;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const OAUTH_VERIFIER_COOKIE: &str = "oauth_verifier";

/// One day.
pub const ACCESS_TOKEN_MAX_AGE: u64 = 86_400;
/// Seven days.
pub const REFRESH_TOKEN_MAX_AGE: u64 = 604_800;
/// Ten minutes, enough to finish an OAuth round trip.
pub const OAUTH_VERIFIER_MAX_AGE: u64 = 600;

/// A `Set-Cookie` header pair, ready for `AppendHeaders`.
pub type SetCookie = (HeaderName, HeaderValue);

fn render(mode: CookieMode, name: &str, value: &str, max_age: u64) -> Result<SetCookie, ApiError> {
    let cookie = format!(
        "{}={}; Max-Age={}; HttpOnly; Path=/; {}",
        name,
        value,
        max_age,
        mode.attributes()
    );
    HeaderValue::from_str(&cookie)
        .map(|v| (header::SET_COOKIE, v))
        .map_err(|_| ApiError::Internal(format!("Cookie value for {} is not header-safe", name)))
}

/// Cookie carrying `value` for `max_age` seconds.
pub fn set(mode: CookieMode, name: &str, value: &str, max_age: u64) -> Result<SetCookie, ApiError> {
    if value.is_empty() || value.contains([';', ',', ' ']) {
        return Err(ApiError::Internal(format!(
            "Cookie value for {} is not cookie-safe",
            name
        )));
    }
    render(mode, name, value, max_age)
}

/// Expire a cookie set with the same policy.
pub fn clear(mode: CookieMode, name: &str) -> Result<SetCookie, ApiError> {
    render(mode, name, "", 0)
}

/// PKCE verifier cookie. The OAuth provider sends the browser back with a
/// cross-site redirect, so the cookie is never `SameSite=Strict`.
pub fn set_oauth_verifier(mode: CookieMode, verifier: &str) -> Result<SetCookie, ApiError> {
    set(
        mode.for_redirect_return(),
        OAUTH_VERIFIER_COOKIE,
        verifier,
        OAUTH_VERIFIER_MAX_AGE,
    )
}

/// Expire the verifier cookie with the attributes it was set with.
pub fn clear_oauth_verifier(mode: CookieMode) -> Result<SetCookie, ApiError> {
    clear(mode.for_redirect_return(), OAUTH_VERIFIER_COOKIE)
}

/// Session cookies for a freshly issued token pair.
pub fn session(
    mode: CookieMode,
    access_token: &str,
    refresh_token: Option<&str>,
) -> Result<Vec<SetCookie>, ApiError> {
    let mut cookies = vec![set(mode, ACCESS_TOKEN_COOKIE, access_token, ACCESS_TOKEN_MAX_AGE)?];
    if let Some(refresh) = refresh_token.filter(|r| !r.is_empty()) {
        cookies.push(set(mode, REFRESH_TOKEN_COOKIE, refresh, REFRESH_TOKEN_MAX_AGE)?);
    }
    Ok(cookies)
}

/// Value of the named request cookie, if present and non-empty.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_attributes_per_mode() {
        let (name, value) = set(CookieMode::Lax, ACCESS_TOKEN_COOKIE, "abc", 86_400).unwrap();
        assert_eq!(name, header::SET_COOKIE);
        assert_eq!(
            value.to_str().unwrap(),
            "access_token=abc; Max-Age=86400; HttpOnly; Path=/; Secure; SameSite=Lax"
        );

        let (_, value) = set(CookieMode::Insecure, ACCESS_TOKEN_COOKIE, "abc", 1).unwrap();
        assert!(!value.to_str().unwrap().contains("Secure"));

        let (_, value) = set(CookieMode::CrossSite, ACCESS_TOKEN_COOKIE, "abc", 1).unwrap();
        assert!(value.to_str().unwrap().ends_with("Secure; SameSite=None"));
    }

    #[test]
    fn test_clear_matches_attributes() {
        let (_, value) = clear(CookieMode::Strict, REFRESH_TOKEN_COOKIE).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "refresh_token=; Max-Age=0; HttpOnly; Path=/; Secure; SameSite=Strict"
        );
    }

    #[test]
    fn test_oauth_verifier_is_lax_under_strict_mode() {
        let (_, value) = set_oauth_verifier(CookieMode::Strict, "v123").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "oauth_verifier=v123; Max-Age=600; HttpOnly; Path=/; Secure; SameSite=Lax"
        );
        let (_, value) = clear_oauth_verifier(CookieMode::Strict).unwrap();
        assert!(value.to_str().unwrap().ends_with("Max-Age=0; HttpOnly; Path=/; Secure; SameSite=Lax"));

        let (_, value) = set_oauth_verifier(CookieMode::CrossSite, "v123").unwrap();
        assert!(value.to_str().unwrap().ends_with("Secure; SameSite=None"));
        let (_, value) = set_oauth_verifier(CookieMode::Insecure, "v123").unwrap();
        assert!(!value.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_set_rejects_unsafe_values() {
        assert!(set(CookieMode::Lax, ACCESS_TOKEN_COOKIE, "a;b", 1).is_err());
        assert!(set(CookieMode::Lax, ACCESS_TOKEN_COOKIE, "", 1).is_err());
    }

    #[test]
    fn test_session_skips_missing_refresh() {
        assert_eq!(session(CookieMode::Lax, "a", None).unwrap().len(), 1);
        assert_eq!(session(CookieMode::Lax, "a", Some("r")).unwrap().len(), 2);
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=tok123; refresh_token="),
        );
        assert_eq!(read(&headers, ACCESS_TOKEN_COOKIE).as_deref(), Some("tok123"));
        assert_eq!(read(&headers, REFRESH_TOKEN_COOKIE), None);
        assert_eq!(read(&headers, OAUTH_VERIFIER_COOKIE), None);
    }
}
