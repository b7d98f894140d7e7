// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup.

use std::env;

/// Default lookback window for a user's first import.
pub const DEFAULT_IMPORT_LOOKBACK_DAYS: i64 = 90;
/// Default Strava page size for activity listing.
pub const DEFAULT_IMPORT_PAGE_SIZE: u32 = 100;
/// Strava rejects `per_page` above this.
pub const MAX_IMPORT_PAGE_SIZE: u32 = 200;
/// Default timeout applied to every Strava HTTP call.
pub const DEFAULT_STRAVA_TIMEOUT_SECS: u64 = 15;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (KMS key location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    /// Strava REST API base URL
    pub strava_api_base_url: String,
    /// Strava OAuth base URL (token exchange and refresh)
    pub strava_oauth_base_url: String,
    /// Timeout for Strava HTTP calls, in seconds
    pub strava_timeout_secs: u64,
    /// How far back a first import reaches
    pub import_lookback_days: i64,
    /// Strava `per_page` used while importing
    pub import_page_size: u32,
    /// Optional GeoJSON file overriding the default region box
    pub region_geojson_path: Option<String>,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Identity provider session key (HS256, raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Key used to sign the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Webhook verification token
    pub webhook_verify_token: String,
    /// Shared key for operator (`/admin`) routes
    pub operator_api_key: String,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-east4".to_string(),
            port: 8080,
            strava_api_base_url: "https://www.strava.com/api/v3".to_string(),
            strava_oauth_base_url: "https://www.strava.com/oauth".to_string(),
            strava_timeout_secs: DEFAULT_STRAVA_TIMEOUT_SECS,
            import_lookback_days: DEFAULT_IMPORT_LOOKBACK_DAYS,
            import_page_size: DEFAULT_IMPORT_PAGE_SIZE,
            region_geojson_path: None,
            strava_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            webhook_verify_token: "test_verify_token".to_string(),
            operator_api_key: "test_operator_key".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let import_page_size = parse_or("IMPORT_PAGE_SIZE", DEFAULT_IMPORT_PAGE_SIZE)?;
        if import_page_size == 0 {
            return Err(ConfigError::Invalid("IMPORT_PAGE_SIZE", "must be positive"));
        }

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-east4".to_string()),
            port: parse_or("PORT", 8080)?,
            strava_api_base_url: env::var("STRAVA_API_BASE_URL")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_oauth_base_url: env::var("STRAVA_OAUTH_BASE_URL")
                .unwrap_or_else(|_| "https://www.strava.com/oauth".to_string()),
            strava_timeout_secs: parse_or("STRAVA_HTTP_TIMEOUT_SECS", DEFAULT_STRAVA_TIMEOUT_SECS)?,
            import_lookback_days: parse_or("IMPORT_LOOKBACK_DAYS", DEFAULT_IMPORT_LOOKBACK_DAYS)?,
            import_page_size: import_page_size.min(MAX_IMPORT_PAGE_SIZE),
            region_geojson_path: env::var("REGION_GEOJSON_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),

            strava_client_secret: required_secret("STRAVA_CLIENT_SECRET")?,
            jwt_signing_key: required_secret("JWT_SIGNING_KEY")?.into_bytes(),
            oauth_state_key: required_secret("OAUTH_STATE_KEY")?.into_bytes(),
            webhook_verify_token: required_secret("WEBHOOK_VERIFY_TOKEN")?,
            operator_api_key: required_secret("OPERATOR_API_KEY")?,
        })
    }
}

fn required_secret(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, "could not be parsed")),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid environment variable {0}: {1}")]
    Invalid(&'static str, &'static str),
}
