// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and credential lifecycle.
//!
//! Handles:
//! - Activity listing for imports
//! - OAuth code exchange
//! - Token refresh when expired
//! - Mapping provider failures onto retryable error kinds

use crate::config::Config;
use crate::error::AppError;
use crate::models::{AthleteProfile, OAuthGrant};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Marker Strava includes in the body when a refresh token was already used.
const INVALID_GRANT: &str = "invalid_grant";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base_url: String,
    oauth_base_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a client with OAuth credentials, base URLs and timeout from config.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.strava_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base_url: config.strava_api_base_url.trim_end_matches('/').to_string(),
            oauth_base_url: config.strava_oauth_base_url.trim_end_matches('/').to_string(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
        })
    }

    /// List the athlete's activities started after `after` (paginated, 1-based).
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.api_base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        check_response_json(response).await
    }

    /// Fetch a single activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivitySummary, AppError> {
        let url = format!("{}/activities/{}", self.api_base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(unavailable)?;

        check_response_json(response).await
    }

    /// Exchange a refresh token for a new credential pair.
    ///
    /// Every failure is reported as `RefreshFailed`; the message keeps the
    /// provider's body so callers can detect `invalid_grant`.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RefreshFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("JSON parse error: {}", e)))
    }

    /// Exchange an authorization code for a credential pair and profile.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthGrant, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        let exchange: TokenExchangeResponse = check_response_json(response).await?;

        Ok(OAuthGrant {
            athlete_id: exchange.athlete.id,
            access_token: exchange.access_token,
            refresh_token: exchange.refresh_token,
            expires_at: exchange.expires_at,
            profile: exchange.athlete.profile,
        })
    }

    /// URL of Strava's consent screen.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.oauth_base_url,
            self.client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(REQUESTED_SCOPES),
            urlencoding::encode(state)
        )
    }
}

/// Scopes requested during authorization.
pub const REQUESTED_SCOPES: &str = "read,activity:read_all";

fn unavailable(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::ProviderUnavailable("request timed out".to_string())
    } else {
        AppError::ProviderUnavailable(e.to_string())
    }
}

/// Check response status and parse JSON body.
///
/// Rate limits and server errors are transient; other non-2xx statuses are
/// reported as API errors.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(AppError::ProviderUnavailable("rate limited".to_string()));
        }

        if status.is_server_error() {
            return Err(AppError::ProviderUnavailable(format!("HTTP {}", status)));
        }

        return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    athlete: StravaAthlete,
}

#[derive(Debug, Clone, Deserialize)]
struct StravaAthlete {
    id: u64,
    #[serde(flatten)]
    profile: AthleteProfile,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sport_type: Option<String>,
    /// Legacy activity type
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub start_date: DateTime<Utc>,
    /// Meters
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: u64,
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub max_speed: f64,
    /// `[lat, lng]`, or empty when the activity has no GPS
    #[serde(default)]
    pub start_latlng: Option<Vec<f64>>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_state: Option<String>,
    #[serde(default)]
    pub manual: bool,
}

impl StravaActivitySummary {
    /// Start coordinates, if the activity has a usable start point.
    pub fn start_point(&self) -> (Option<f64>, Option<f64>) {
        match self.start_latlng.as_deref() {
            Some([lat, lng]) => (Some(*lat), Some(*lng)),
            _ => (None, None),
        }
    }

    /// "City, State" from whatever location fields are present.
    pub fn place_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.location_city, &self.location_state]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::FirestoreDb;
use crate::models::{User, UserTokens};
use crate::services::KmsService;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// A credential is expired once `now` reaches its expiry (no early margin).
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}

/// High-level Strava service that manages token lifecycle and API calls.
///
/// This service encapsulates:
/// - Token retrieval and decryption from Firestore
/// - Refresh on expiry, persisting the new pair in one document write
/// - In-memory token caching to reduce KMS calls
/// - Per-user locking to prevent duplicate refresh calls
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: FirestoreDb,
    kms: KmsService,
    /// In-memory cache of decrypted access tokens (shared across requests).
    token_cache: TokenCache,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl StravaService {
    /// Create a new Strava service with shared token cache.
    pub fn new(
        client: StravaClient,
        db: FirestoreDb,
        kms: KmsService,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client,
            db,
            kms,
            token_cache,
            refresh_locks,
        }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    fn cached_token(&self, user_id: &str, now: DateTime<Utc>) -> Option<String> {
        self.token_cache
            .get(user_id)
            .filter(|cached| !is_expired(cached.expires_at, now))
            .map(|cached| cached.access_token.clone())
    }

    fn cache_token(&self, user_id: &str, access_token: &str, expires_at: DateTime<Utc>) {
        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: access_token.to_string(),
                expires_at,
            },
        );
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// 1. Check in-memory cache
    /// 2. Acquire per-user lock, then re-check the cache
    /// 3. Load from Firestore (`NotConnected` if absent) and decrypt
    /// 4. If expired, refresh with Strava and persist the new pair
    ///
    /// A failed refresh returns `RefreshFailed` and writes nothing.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        if let Some(token) = self.cached_token(user_id, Utc::now()) {
            return Ok(token);
        }

        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let now = Utc::now();
        if let Some(token) = self.cached_token(user_id, now) {
            return Ok(token);
        }

        let tokens = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        let aad = user_id.as_bytes();

        if !is_expired(tokens.expires_at, now) {
            let access_token = self.kms.decrypt(&tokens.access_token_encrypted, aad).await?;
            self.cache_token(user_id, &access_token, tokens.expires_at);
            return Ok(access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let refresh_token = self
            .kms
            .decrypt(&tokens.refresh_token_encrypted, aad)
            .await?;

        let new_tokens = match self.client.refresh_token(&refresh_token).await {
            Ok(t) => t,
            Err(AppError::RefreshFailed(msg)) if msg.contains(INVALID_GRANT) => {
                // Another instance may have already rotated the pair.
                return self.reload_after_race(user_id, &tokens, msg).await;
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh failed");
                return Err(e);
            }
        };

        let new_expires_at = DateTime::from_timestamp(new_tokens.expires_at, 0).ok_or_else(|| {
            AppError::RefreshFailed(format!("invalid expires_at {}", new_tokens.expires_at))
        })?;

        let (new_enc_access, new_enc_refresh) = crate::services::kms::encrypt_tokens(
            &self.kms,
            &new_tokens.access_token,
            &new_tokens.refresh_token,
            user_id,
        )
        .await?;

        let updated_tokens = UserTokens {
            access_token_encrypted: new_enc_access,
            refresh_token_encrypted: new_enc_refresh,
            expires_at: new_expires_at,
            scopes: tokens.scopes.clone(),
        };

        self.db.set_tokens(user_id, &updated_tokens).await?;
        self.cache_token(user_id, &new_tokens.access_token, new_expires_at);

        tracing::info!(user_id, "Token refreshed and cached");
        Ok(new_tokens.access_token)
    }

    /// Re-read tokens after `invalid_grant`; use them only if they changed
    /// and are still valid.
    async fn reload_after_race(
        &self,
        user_id: &str,
        stale: &UserTokens,
        msg: String,
    ) -> Result<String, AppError> {
        let current = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        if current.refresh_token_encrypted == stale.refresh_token_encrypted
            || is_expired(current.expires_at, Utc::now())
        {
            tracing::warn!(user_id, "Refresh token rejected by Strava");
            return Err(AppError::RefreshFailed(msg));
        }

        tracing::info!(user_id, "Refresh race detected, using stored tokens");
        let access_token = self
            .kms
            .decrypt(&current.access_token_encrypted, user_id.as_bytes())
            .await?;
        self.cache_token(user_id, &access_token, current.expires_at);
        Ok(access_token)
    }

    // ─── OAuth Grant Handling ────────────────────────────────────────────────

    /// Store a freshly exchanged grant: overwrite the credential pair, mark the
    /// user connected and copy the Strava profile. Profile and tokens are
    /// written in one transaction.
    pub async fn apply_new_grant(&self, user_id: &str, grant: OAuthGrant) -> Result<User, AppError> {
        let now = Utc::now();

        let expires_at = DateTime::from_timestamp(grant.expires_at, 0).ok_or_else(|| {
            AppError::BadRequest(format!("invalid grant expiry {}", grant.expires_at))
        })?;

        let mut user = self
            .db
            .get_user(user_id)
            .await?
            .unwrap_or_else(|| User::new(user_id, now));

        user.strava_athlete_id = Some(grant.athlete_id);
        user.firstname = grant.profile.firstname;
        user.lastname = grant.profile.lastname;
        user.profile_picture = grant.profile.profile;
        user.city = grant.profile.city;
        user.region = grant.profile.state;
        user.connected_at = Some(now);

        let (enc_access, enc_refresh) = crate::services::kms::encrypt_tokens(
            &self.kms,
            &grant.access_token,
            &grant.refresh_token,
            user_id,
        )
        .await?;

        let tokens = UserTokens {
            access_token_encrypted: enc_access,
            refresh_token_encrypted: enc_refresh,
            expires_at,
            scopes: REQUESTED_SCOPES.split(',').map(String::from).collect(),
        };

        self.db.apply_grant_atomic(&user, &tokens).await?;
        self.token_cache.remove(user_id);

        tracing::info!(
            user_id,
            athlete_id = grant.athlete_id,
            "Strava grant applied, user connected"
        );

        Ok(user)
    }

    /// Exchange an OAuth code and apply the resulting grant.
    pub async fn connect(&self, user_id: &str, code: &str) -> Result<User, AppError> {
        let grant = self.client.exchange_code(code).await?;
        self.apply_new_grant(user_id, grant).await
    }

    /// Drop any cached state for a deleted user.
    pub fn forget_user(&self, user_id: &str) {
        self.token_cache.remove(user_id);
        self.refresh_locks.remove(user_id);
    }
}
