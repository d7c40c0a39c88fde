//! Shared HTTP plumbing for the Supabase services.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use nosh_core::{logging, Error, Result};

/// Default outbound request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a Supabase project.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. `https://<ref>.supabase.co`.
    pub url: String,
    /// Public key; used for auth calls.
    pub anon_key: String,
    /// Privileged key; used for row and storage calls.
    pub service_role_key: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("service_role_key", &"<redacted>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(
        url: impl Into<String>,
        anon_key: impl Into<String>,
        service_role_key: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: service_role_key.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

/// Which key a request is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyRole {
    Anon,
    Service,
}

/// One pooled HTTP client shared by the auth, rest and storage modules.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    config: Arc<SupabaseConfig>,
}

/// Error bodies differ per service; take the first message present.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
            .filter(|m| !m.is_empty())
    }
}

impl SupabaseClient {
    /// Build the HTTP client. Called once at startup.
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::Config("Supabase URL is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Absolute URL of a service endpoint.
    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.url, endpoint)
    }

    /// Request carrying the `apikey` header and a bearer credential.
    ///
    /// Service-role requests use the service key as bearer; anon requests
    /// use `bearer` when given (user access token) and the anon key otherwise.
    pub(crate) fn request(
        &self,
        method: Method,
        endpoint: &str,
        role: KeyRole,
        bearer: Option<&str>,
    ) -> RequestBuilder {
        let key = match role {
            KeyRole::Anon => &self.config.anon_key,
            KeyRole::Service => &self.config.service_role_key,
        };
        let token = bearer.unwrap_or(key);
        self.http
            .request(method, self.url(endpoint))
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", token))
    }

    /// Send a request and turn non-success statuses into [`Error::Provider`].
    pub(crate) async fn send(&self, req: RequestBuilder, op: &'static str) -> Result<Response> {
        let start = Instant::now();
        let response = req
            .send()
            .await
            .map_err(|e| Error::Request(format!("{} request failed: {}", op, e)))?;
        let status = response.status();
        debug!(
            { logging::OPERATION } = op,
            { logging::STATUS } = status.as_u16(),
            { logging::DURATION_MS } = start.elapsed().as_millis() as u64,
            "Supabase call finished"
        );
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown error").to_string()
                } else {
                    text
                }
            });
        Err(Error::Provider {
            status: status.as_u16(),
            message,
        })
    }

    /// Decode a JSON response body.
    pub(crate) async fn json<T: DeserializeOwned>(response: Response, op: &str) -> Result<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Request(format!("{} body read failed: {}", op, e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("{} returned unexpected JSON: {}", op, e)))
    }
}

/// Percent-encode every segment of an object path, keeping the separators.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
