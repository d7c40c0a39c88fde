//! Session guard.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use tracing::{debug, warn};

use nosh_core::{logging, AuthUser};

use crate::cookies::{self, ACCESS_TOKEN_COOKIE};
use crate::{ApiError, AppState};

/// Extractor for authenticated requests.
///
/// Reads the `access_token` cookie, falling back to an
/// `Authorization: Bearer` header, and resolves it through the auth
/// provider. Requests without a credential are rejected before any
/// platform call.
///
/// ```ignore
/// async fn handler(session: Session) -> impl IntoResponse {
///     session.user.id.to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    pub user: AuthUser,
    pub access_token: String,
}

impl Session {
    /// Email of the session's identity.
    pub fn email(&self) -> Result<&str, ApiError> {
        Ok(self.user.require_email()?)
    }
}

/// Credential from the cookie, else from a bearer header.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    cookies::read(headers, ACCESS_TOKEN_COOKIE).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        match state.platform.auth.get_user(&token).await {
            Ok(Some(user)) => {
                debug!({ logging::AUTH_ID } = %user.id, "Session resolved");
                Ok(Session {
                    user,
                    access_token: token,
                })
            }
            Ok(None) => Err(ApiError::Unauthorized(
                "Invalid or expired session".to_string(),
            )),
            Err(e) => {
                warn!(error = %e, "Session lookup failed");
                Err(ApiError::Unauthorized(
                    "Invalid or expired session".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(access_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(access_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_no_credential() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(access_token(&headers).is_none());
        assert!(access_token(&HeaderMap::new()).is_none());
    }
}
