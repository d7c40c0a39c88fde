//! Server configuration, read once at startup.
//!
//! Environment variables:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SUPABASE_URL` | required |
//! | `SUPABASE_ANON_KEY` | required |
//! | `SUPABASE_SERVICE_ROLE_KEY` | required |
//! | `FRONTEND_URL` | `http://localhost:3000` |
//! | `BACKEND_URL` | `http://localhost:8000` |
//! | `COOKIE_MODE` | `lax` (`strict`, `cross-site`, `insecure`) |
//! | `PORT` | `8000` |
//! | `ALLOWED_ORIGINS` | `FRONTEND_URL` |
//! | `SIGNED_URL_TTL_SECS` | `3600` |
//! | `PLATFORM_TIMEOUT_SECS` | `30` |
//! | `MAX_UPLOAD_BYTES` | `20971520` |

use std::str::FromStr;

use axum::http::HeaderValue;
use nosh_core::{Error, Result};
use nosh_platform::{SupabaseConfig, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// `Secure`/`SameSite` policy applied to every cookie the server sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookieMode {
    /// `Secure; SameSite=Lax`
    #[default]
    Lax,
    /// `Secure; SameSite=Strict`
    Strict,
    /// `Secure; SameSite=None`, for a frontend on another site.
    CrossSite,
    /// `SameSite=Lax` without `Secure`, for plain-HTTP development.
    Insecure,
}

impl CookieMode {
    /// Cookie attributes appended after `HttpOnly; Path=/`.
    pub fn attributes(&self) -> &'static str {
        match self {
            CookieMode::Lax => "Secure; SameSite=Lax",
            CookieMode::Strict => "Secure; SameSite=Strict",
            CookieMode::CrossSite => "Secure; SameSite=None",
            CookieMode::Insecure => "SameSite=Lax",
        }
    }

    /// Mode for a cookie that must survive a cross-site top-level redirect
    /// back to this server. `Strict` drops to `Lax`; `Secure` is unchanged.
    pub fn for_redirect_return(self) -> Self {
        match self {
            CookieMode::Strict => CookieMode::Lax,
            other => other,
        }
    }
}

impl FromStr for CookieMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(CookieMode::Lax),
            "strict" => Ok(CookieMode::Strict),
            "cross-site" | "cross_site" | "none" => Ok(CookieMode::CrossSite),
            "insecure" => Ok(CookieMode::Insecure),
            other => Err(Error::Config(format!(
                "COOKIE_MODE must be lax, strict, cross-site or insecure, got '{}'",
                other
            ))),
        }
    }
}

/// Everything the server needs, passed down explicitly.
#[derive(Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub frontend_url: String,
    pub backend_url: String,
    pub cookie_mode: CookieMode,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub signed_url_ttl_secs: u64,
    pub platform_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("{} must be set", key)))
        };

        let frontend_url = get("FRONTEND_URL")
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let backend_url = get("BACKEND_URL")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .collect(),
            None => vec![frontend_url.clone()],
        };

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            frontend_url,
            backend_url,
            cookie_mode: get("COOKIE_MODE")
                .map(|v| v.parse::<CookieMode>())
                .transpose()?
                .unwrap_or_default(),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            allowed_origins,
            signed_url_ttl_secs: parse_or(&get, "SIGNED_URL_TTL_SECS", DEFAULT_SIGNED_URL_TTL_SECS)?,
            platform_timeout_secs: parse_or(&get, "PLATFORM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    /// Connection settings for the platform client.
    pub fn supabase(&self) -> SupabaseConfig {
        SupabaseConfig::new(
            &self.supabase_url,
            &self.supabase_anon_key,
            &self.supabase_service_role_key,
        )
        .with_timeout(self.platform_timeout_secs)
    }

    /// OAuth redirect target registered with the provider.
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.backend_url)
    }

    /// Where the browser lands after a successful OAuth login.
    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.frontend_url)
    }

    /// CORS whitelist; invalid entries are skipped with a warning.
    pub fn cors_origins(&self) -> Vec<HeaderValue> {
        self.allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                    None
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("supabase_url", &self.supabase_url)
            .field("frontend_url", &self.frontend_url)
            .field("backend_url", &self.backend_url)
            .field("cookie_mode", &self.cookie_mode)
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .finish_non_exhaustive()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid number: '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SUPABASE_URL", "https://proj.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("SUPABASE_SERVICE_ROLE_KEY", "service"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.frontend_url, DEFAULT_FRONTEND_URL);
        assert_eq!(config.cookie_mode, CookieMode::Lax);
        assert_eq!(config.port, 8000);
        assert_eq!(config.allowed_origins, vec![DEFAULT_FRONTEND_URL.to_string()]);
        assert_eq!(config.signed_url_ttl_secs, 3600);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.oauth_callback_url(), "http://localhost:8000/auth/callback");
        assert_eq!(config.dashboard_url(), "http://localhost:3000/dashboard");
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_SERVICE_ROLE_KEY"));
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[1] = ("SUPABASE_ANON_KEY", "  ");
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("FRONTEND_URL", "https://nosh.example/"),
            ("COOKIE_MODE", "cross-site"),
            ("PORT", "9100"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example/"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.dashboard_url(), "https://nosh.example/dashboard");
        assert_eq!(config.cookie_mode, CookieMode::CrossSite);
        assert_eq!(config.port, 9100);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.cors_origins().len(), 2);
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_cookie_mode_parsing() {
        assert_eq!("STRICT".parse::<CookieMode>().unwrap(), CookieMode::Strict);
        assert_eq!("insecure".parse::<CookieMode>().unwrap(), CookieMode::Insecure);
        assert!("sometimes".parse::<CookieMode>().is_err());
        assert_eq!(CookieMode::CrossSite.attributes(), "Secure; SameSite=None");
        assert!(!CookieMode::Insecure.attributes().contains("Secure"));
    }
}
