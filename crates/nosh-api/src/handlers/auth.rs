//! Auth handlers: sign-up, sign-in, OAuth, token store, current user, logout.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect},
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use nosh_core::{
    derive_username, hash_password, logging, validate_credentials, AuthMethod, AuthUser,
    NewProfile, Profile,
};

use crate::cookies::{self, ACCESS_TOKEN_COOKIE, OAUTH_VERIFIER_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::session::{access_token, Session};
use crate::{ApiError, AppState};

const PROFILE_SYNC_FAILED: &str = "User created in auth, but failed to sync profile.";
const PKCE_VERIFIER_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Register an email/password account and mirror it into `users`.
///
/// # Returns
/// - 200 `{user_id, email}`
/// - 400 for malformed input or a provider rejection
/// - 500 when the auth identity exists but the profile row could not be written
#[instrument(skip_all, fields(subsystem = "api", op = "signup"))]
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = body.email.trim();
    validate_credentials(email, &body.password)?;

    let user = state
        .platform
        .auth
        .sign_up(email, &body.password)
        .await
        .map_err(|e| match e {
            nosh_core::Error::Provider { .. } => ApiError::BadRequest(e.detail()),
            other => other.into(),
        })?
        .ok_or_else(|| ApiError::BadRequest("Signup failed".to_string()))?;

    let profile = NewProfile {
        username: derive_username(email),
        email: email.to_string(),
        password: Some(hash_password(&body.password)?),
        auth_id: user.id,
        provider: AuthMethod::Email,
    };
    match state.platform.profiles.insert(profile).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!({ logging::AUTH_ID } = %user.id, "Profile insert returned no row; auth identity orphaned");
            return Err(ApiError::Internal(PROFILE_SYNC_FAILED.to_string()));
        }
        Err(e) => {
            warn!({ logging::AUTH_ID } = %user.id, error = %e, "Profile insert failed; auth identity orphaned");
            return Err(ApiError::Internal(PROFILE_SYNC_FAILED.to_string()));
        }
    }

    info!({ logging::AUTH_ID } = %user.id, "User signed up");
    Ok(Json(json!({
        "user_id": user.id,
        "email": user.email.as_deref().unwrap_or(email),
    })))
}

/// Exchange credentials for session cookies.
#[instrument(skip_all, fields(subsystem = "api", op = "signin"))]
pub async fn signin(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state
        .platform
        .auth
        .sign_in_with_password(body.email.trim(), &body.password)
        .await
        .map_err(|e| match e {
            nosh_core::Error::Provider { .. } => ApiError::BadRequest(e.detail()),
            other => other.into(),
        })?;

    let cookies = cookies::session(
        state.config.cookie_mode,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
    )?;
    info!("User signed in");
    Ok((
        AppendHeaders(cookies),
        Json(json!({ "message": "Login successful" })),
    ))
}

/// Random PKCE verifier and its S256 challenge.
fn pkce_pair() -> (String, String) {
    let verifier: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PKCE_VERIFIER_LEN)
        .map(char::from)
        .collect();
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

/// Redirect the browser to the provider's Google login.
pub async fn login_google(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let (verifier, challenge) = pkce_pair();
    let url = state.platform.auth.authorize_url(
        "google",
        &state.config.oauth_callback_url(),
        &challenge,
    );
    let cookie = cookies::set_oauth_verifier(state.config.cookie_mode, &verifier)?;
    Ok((AppendHeaders([cookie]), Redirect::temporary(&url)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Finish the OAuth flow: exchange the code, mirror the profile, set
/// cookies and send the browser to the dashboard.
#[instrument(skip_all, fields(subsystem = "api", op = "oauth_callback"))]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(error) = query.error {
        return Err(ApiError::BadRequest(
            query.error_description.unwrap_or(error),
        ));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing authorization code".to_string()))?;
    let verifier = cookies::read(&headers, OAUTH_VERIFIER_COOKIE)
        .ok_or_else(|| ApiError::BadRequest("Missing OAuth verifier".to_string()))?;

    let tokens = state
        .platform
        .auth
        .exchange_code(&code, &verifier)
        .await
        .map_err(ApiError::rejected_by_provider)?;
    let user = state
        .platform
        .auth
        .get_user(&tokens.access_token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;
    ensure_profile(&state, &user).await?;

    let mode = state.config.cookie_mode;
    let mut set_cookies = cookies::session(
        mode,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
    )?;
    set_cookies.push(cookies::clear_oauth_verifier(mode)?);

    info!({ logging::AUTH_ID } = %user.id, "OAuth login completed");
    Ok((
        AppendHeaders(set_cookies),
        Redirect::temporary(&state.config.dashboard_url()),
    ))
}

/// Insert a Google profile unless one already exists for the email.
async fn ensure_profile(state: &AppState, user: &AuthUser) -> Result<Profile, ApiError> {
    let email = user.require_email()?;
    if let Some(existing) = state.platform.profiles.find_by_email(email).await? {
        return Ok(existing);
    }
    let profile = NewProfile {
        username: derive_username(email),
        email: email.to_string(),
        password: None,
        auth_id: user.id,
        provider: AuthMethod::Google,
    };
    match state.platform.profiles.insert(profile).await {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(ApiError::Internal(PROFILE_SYNC_FAILED.to_string())),
        Err(e) => {
            warn!({ logging::AUTH_ID } = %user.id, error = %e, "OAuth profile insert failed");
            Err(ApiError::Internal(PROFILE_SYNC_FAILED.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StoreTokenRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Store tokens obtained client-side as session cookies.
#[instrument(skip_all, fields(subsystem = "api", op = "store_token"))]
pub async fn store_token(
    State(state): State<AppState>,
    Json(body): Json<StoreTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = body.access_token.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    }
    let user = match state.platform.auth.get_user(token).await {
        Ok(Some(user)) => user,
        Ok(None) | Err(_) => {
            return Err(ApiError::Unauthorized(
                "Invalid or expired session".to_string(),
            ))
        }
    };

    let cookies = cookies::session(
        state.config.cookie_mode,
        token,
        body.refresh_token.as_deref().map(str::trim),
    )?;
    info!({ logging::AUTH_ID } = %user.id, "Tokens stored");
    Ok((
        AppendHeaders(cookies),
        Json(json!({ "message": "Tokens stored" })),
    ))
}

/// Current identity plus its mirrored profile (or `null`).
pub async fn me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = state
        .platform
        .profiles
        .find_by_email(session.email()?)
        .await?
        .map(|p| json!({ "id": p.id, "username": p.username, "email": p.email }));
    Ok(Json(json!({ "user": session.user, "profile": profile })))
}

/// Clear session cookies; revoke the provider session when possible.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = access_token(&headers) {
        if let Err(e) = state.platform.auth.sign_out(&token).await {
            warn!(error = %e, "Session revoke failed");
        }
    }
    let mode = state.config.cookie_mode;
    let cleared = vec![
        cookies::clear(mode, ACCESS_TOKEN_COOKIE)?,
        cookies::clear(mode, REFRESH_TOKEN_COOKIE)?,
    ];
    Ok((
        AppendHeaders(cleared),
        Json(json!({ "message": "Logged out" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_pair_shape() {
        let (verifier, challenge) = pkce_pair();
        assert_eq!(verifier.len(), PKCE_VERIFIER_LEN);
        assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));
        // SHA-256 digest, base64url without padding
        assert_eq!(challenge.len(), 43);
        assert!(!challenge.contains(['+', '/', '=']));
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }
}
