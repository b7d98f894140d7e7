// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth connection routes.
//!
//! The signed-in user starts the flow; the callback is public and learns
//! who is connecting from the HMAC-signed `state` parameter.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Extension, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed state stays valid (milliseconds).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Routes that need a signed-in user.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/strava", get(auth_start))
}

/// Routes Strava redirects back to.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/strava/callback", get(auth_callback))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Callback URL on this host.
fn callback_url(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/strava/callback", scheme, host)
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let oauth_state = sign_state(&user.user_id, now_millis()?, &state.config.oauth_state_key)?;
    let auth_url = state
        .strava_service
        .client()
        .authorize_url(&callback_url(&headers), &oauth_state);

    tracing::info!(user_id = %user.user_id, "Starting OAuth flow, redirecting to Strava");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code, connect the user, start an import.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let frontend_url = state.config.frontend_url.trim_end_matches('/').to_string();

    let user_id = verify_state(&params.state, &state.config.oauth_state_key, now_millis()?)
        .ok_or_else(|| AppError::BadRequest("Invalid or expired OAuth state".to_string()))?;

    if let Some(error) = params.error {
        tracing::warn!(user_id = %user_id, error = %error, "OAuth error from Strava");
        let redirect = format!(
            "{}/connect?error={}",
            frontend_url,
            urlencoding::encode(&error)
        );
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    state.strava_service.connect(&user_id, &code).await?;

    // Initial import runs in the background; the user lands on the frontend
    // right away.
    let importer = state.importer.clone();
    let import_user = user_id.clone();
    tokio::spawn(async move {
        if let Err(e) = importer.import_activities(&import_user).await {
            tracing::warn!(
                user_id = %import_user,
                error = %e,
                retryable = e.is_retryable(),
                "Initial import failed"
            );
        }
    });

    tracing::info!(user_id = %user_id, "Strava connected");

    Ok(Redirect::temporary(&format!(
        "{}/connect?status=connected",
        frontend_url
    )))
}

/// Build a signed state: base64("user_b64|timestamp_hex|signature_hex").
pub fn sign_state(user_id: &str, issued_at_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!(
        "{}|{:x}",
        URL_SAFE_NO_PAD.encode(user_id.as_bytes()),
        issued_at_ms
    );

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes()))
}

/// Verify the signature and age of a state and return the user id it carries.
pub fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let mut parts = state_str.splitn(3, '|');
    let user_b64 = parts.next()?;
    let timestamp_hex = parts.next()?;
    let signature_hex = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", user_b64, timestamp_hex).as_bytes());
    if mac.verify_slice(&hex::decode(signature_hex).ok()?).is_err() {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    let issued_at = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_at) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    let user_id = String::from_utf8(URL_SAFE_NO_PAD.decode(user_b64).ok()?).ok()?;
    (!user_id.is_empty()).then_some(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const ISSUED: u128 = 1_790_000_000_000;

    #[test]
    fn test_state_round_trip() {
        let state = sign_state("auth0|abc", ISSUED, SECRET).unwrap();
        assert_eq!(
            verify_state(&state, SECRET, ISSUED + 1_000),
            Some("auth0|abc".to_string())
        );
    }

    #[test]
    fn test_state_wrong_secret() {
        let state = sign_state("runner", ISSUED, SECRET).unwrap();
        assert_eq!(verify_state(&state, b"wrong_key", ISSUED), None);
    }

    #[test]
    fn test_state_expires_after_ten_minutes() {
        let state = sign_state("runner", ISSUED, SECRET).unwrap();
        assert!(verify_state(&state, SECRET, ISSUED + STATE_MAX_AGE_MS).is_some());
        assert_eq!(
            verify_state(&state, SECRET, ISSUED + STATE_MAX_AGE_MS + 1),
            None
        );
    }

    #[test]
    fn test_state_tampered_user() {
        let state = sign_state("runner", ISSUED, SECRET).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();
        let tampered = decoded.replacen(
            &URL_SAFE_NO_PAD.encode("runner"),
            &URL_SAFE_NO_PAD.encode("victim"),
            1,
        );
        let tampered = URL_SAFE_NO_PAD.encode(tampered.as_bytes());
        assert_eq!(verify_state(&tampered, SECRET, ISSUED), None);
    }

    #[test]
    fn test_state_malformed() {
        let encoded_state = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_state(&encoded_state, SECRET, ISSUED), None);
        assert_eq!(verify_state("%%%", SECRET, ISSUED), None);
    }
}
