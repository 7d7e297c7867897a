// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. Missing secrets abort startup.

use std::env;

const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";
const DEFAULT_PORT: u16 = 3012;

/// Google OAuth and Calendar endpoints.
///
/// Overridable so tests can point the service at a fake provider.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    /// Consent screen URL
    pub auth_url: String,
    /// Code exchange and refresh endpoint
    pub token_url: String,
    /// Calendar API v3 base URL (no trailing slash)
    pub calendar_api_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            calendar_api_url: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Registered OAuth redirect URI (points at /oauth2callback)
    pub google_redirect_uri: String,
    /// Frontend URL: allowed CORS origin and post-OAuth redirect target
    pub client_url: String,
    /// Server port
    pub port: u16,
    /// GCP project for Firestore. `None` selects the in-memory store.
    pub gcp_project_id: Option<String>,
    pub google_endpoints: GoogleEndpoints,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = GoogleEndpoints::default();

        Ok(Self {
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_redirect_uri: required("GOOGLE_REDIRECT_URI")?,
            client_url: env::var("CLIENT_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_CLIENT_URL.to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            gcp_project_id: env::var("GCP_PROJECT_ID").ok().filter(|p| !p.is_empty()),
            google_endpoints: GoogleEndpoints {
                auth_url: env::var("GOOGLE_AUTH_URL").unwrap_or(defaults.auth_url),
                token_url: env::var("GOOGLE_TOKEN_URL").unwrap_or(defaults.token_url),
                calendar_api_url: env::var("GOOGLE_CALENDAR_API_URL")
                    .map(|v| v.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.calendar_api_url),
            },
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            jwt_signing_key: required("JWT_SECRET_KEY")?.into_bytes(),
        })
    }

    /// Config for tests: in-memory store, fixed secrets.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            google_redirect_uri: "http://localhost:3012/oauth2callback".to_string(),
            client_url: DEFAULT_CLIENT_URL.to_string(),
            port: DEFAULT_PORT,
            gcp_project_id: None,
            google_endpoints: GoogleEndpoints::default(),
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Whether cookies must carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.client_url.starts_with("https://")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
