//! GoTrue (`/auth/v1`) implementation of [`AuthProvider`].

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, instrument};

use nosh_core::{logging, AuthProvider, AuthTokens, AuthUser, Error, Result};

use crate::client::{KeyRole, SupabaseClient};

/// Supabase auth service.
#[derive(Clone)]
pub struct SupabaseAuth {
    client: SupabaseClient,
}

/// Sign-up answers with either a bare user or a session wrapping one,
/// depending on whether email confirmation is enabled.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    User(AuthUser),
    Session { user: AuthUser },
    Other(JsonValue),
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn token(&self, grant_type: &str, body: JsonValue, op: &'static str) -> Result<AuthTokens> {
        let endpoint = format!("/auth/v1/token?grant_type={}", grant_type);
        let req = self
            .client
            .request(Method::POST, &endpoint, KeyRole::Anon, None)
            .json(&body);
        let response = self.client.send(req, op).await?;
        SupabaseClient::json(response, op).await
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    #[instrument(skip(self, email, password), fields(subsystem = "auth", op = "sign_up"))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<AuthUser>> {
        let req = self
            .client
            .request(Method::POST, "/auth/v1/signup", KeyRole::Anon, None)
            .json(&json!({ "email": email, "password": password }));
        let response = self.client.send(req, "auth.sign_up").await?;
        let user = match SupabaseClient::json(response, "auth.sign_up").await? {
            SignUpResponse::User(user) | SignUpResponse::Session { user } => Some(user),
            SignUpResponse::Other(_) => None,
        };
        if let Some(user) = &user {
            info!({ logging::AUTH_ID } = %user.id, "Auth identity created");
        }
        Ok(user)
    }

    #[instrument(skip(self, email, password), fields(subsystem = "auth", op = "sign_in"))]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthTokens> {
        self.token(
            "password",
            json!({ "email": email, "password": password }),
            "auth.sign_in",
        )
        .await
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.client.url("/auth/v1/authorize"),
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge),
        )
    }

    #[instrument(skip_all, fields(subsystem = "auth", op = "exchange_code"))]
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<AuthTokens> {
        self.token(
            "pkce",
            json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
            "auth.exchange_code",
        )
        .await
    }

    #[instrument(skip_all, fields(subsystem = "auth", op = "get_user"))]
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        let req = self
            .client
            .request(Method::GET, "/auth/v1/user", KeyRole::Anon, Some(access_token));
        match self.client.send(req, "auth.get_user").await {
            Ok(response) => SupabaseClient::json(response, "auth.get_user").await.map(Some),
            Err(Error::Provider { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16()
                    || status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all, fields(subsystem = "auth", op = "sign_out"))]
    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let req = self
            .client
            .request(Method::POST, "/auth/v1/logout", KeyRole::Anon, Some(access_token));
        self.client.send(req, "auth.sign_out").await?;
        Ok(())
    }
}
