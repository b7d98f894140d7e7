// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile and connection state stored in Firestore.
///
/// The user id comes from the identity provider and is also the document ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Identity provider user id
    pub user_id: String,
    /// Strava athlete ID (None until Strava is connected)
    #[serde(default)]
    pub strava_athlete_id: Option<u64>,
    /// First name (from Strava)
    #[serde(default)]
    pub firstname: Option<String>,
    /// Last name (from Strava)
    #[serde(default)]
    pub lastname: Option<String>,
    /// Profile picture URL
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// State/region from the Strava profile
    #[serde(default)]
    pub region: Option<String>,
    /// When the account row was created
    pub created_at: DateTime<Utc>,
    /// When Strava was (last) connected
    #[serde(default)]
    pub connected_at: Option<DateTime<Utc>>,
    /// When activities were last imported
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl User {
    /// A fresh, not-yet-connected user.
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            strava_athlete_id: None,
            firstname: None,
            lastname: None,
            profile_picture: None,
            city: None,
            region: None,
            created_at: now,
            connected_at: None,
            last_sync_at: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.strava_athlete_id.is_some() && self.connected_at.is_some()
    }
}

/// User's OAuth tokens (encrypted in Firestore).
///
/// Access and refresh tokens always travel together: the document is
/// written whole, so readers never see one without the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokens {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Profile fields Strava returns alongside a new grant.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AthleteProfile {
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    /// Profile picture URL
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Everything produced by a successful OAuth code exchange.
#[derive(Debug, Clone)]
pub struct OAuthGrant {
    pub athlete_id: u64,
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as a Unix timestamp (seconds)
    pub expires_at: i64,
    pub profile: AthleteProfile,
}
