// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ActivityRecord, DropAccess, MileageSummary, ProductDrop, User};
use crate::services::ImportResult;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/sync", post(sync))
        .route("/api/mileage", get(get_mileage))
        .route("/api/activities", get(get_activities))
        .route("/api/drops", get(list_drops))
        .route("/api/drops/{drop_id}/access", get(get_drop_access))
        .route("/api/drops/{drop_id}/access/viewed", post(mark_viewed))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user_id: String,
    pub connected: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub strava_athlete_id: Option<u64>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub profile_picture: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub connected_at: Option<String>,
    pub last_sync_at: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            connected: user.is_connected(),
            user_id: user.user_id,
            strava_athlete_id: user.strava_athlete_id,
            firstname: user.firstname,
            lastname: user.lastname,
            profile_picture: user.profile_picture,
            city: user.city,
            region: user.region,
            connected_at: user.connected_at.map(format_utc_rfc3339),
            last_sync_at: user.last_sync_at.map(format_utc_rfc3339),
        }
    }
}

/// Get current user profile, creating the unconnected row on first visit.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = match state.db.get_user(&user.user_id).await? {
        Some(profile) => profile,
        None => {
            let fresh = User::new(&user.user_id, chrono::Utc::now());
            if state.db.create_user_if_absent(&fresh).await? {
                tracing::info!(user_id = %user.user_id, "Created user record");
                fresh
            } else {
                // Lost a race with a concurrent first request
                state.db.get_user(&user.user_id).await?.unwrap_or(fresh)
            }
        }
    };

    Ok(Json(profile.into()))
}

// ─── Sync & Mileage ──────────────────────────────────────────

/// Import the caller's recent runs now.
async fn sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ImportResult>> {
    tracing::info!(user_id = %user.user_id, "User-initiated sync");
    let result = state.importer.import_activities(&user.user_id).await?;
    Ok(Json(result))
}

/// The caller's mileage summary (zeroed if nothing has been imported).
async fn get_mileage(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MileageSummary>> {
    let summary = state
        .db
        .get_mileage_summary(&user.user_id)
        .await?
        .unwrap_or_else(|| MileageSummary::new(&user.user_id, chrono::Utc::now()));
    Ok(Json(summary))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    50
}

const MAX_PER_PAGE: u32 = 100;

/// Decode an opaque cursor into the offset of the next item.
pub fn parse_cursor(cursor: Option<&str>) -> Result<u32> {
    let Some(raw) = cursor else {
        return Ok(0);
    };

    let invalid_cursor = || AppError::BadRequest("Invalid 'cursor' parameter".to_string());
    let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
    std::str::from_utf8(&decoded)
        .ok()
        .and_then(|s| s.strip_prefix("o:"))
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(invalid_cursor)
}

pub fn encode_cursor(offset: u32) -> String {
    URL_SAFE_NO_PAD.encode(format!("o:{}", offset))
}

#[derive(Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<ActivityRecord>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

/// Get the caller's activities, newest first.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>> {
    if params.per_page == 0 {
        return Err(AppError::BadRequest(
            "per_page must be greater than 0".to_string(),
        ));
    }

    let limit = params.per_page.min(MAX_PER_PAGE);
    let offset = parse_cursor(params.cursor.as_deref())?;

    tracing::debug!(user_id = %user.user_id, offset, limit, "Fetching activities");

    // Fetch one extra item to determine if another page is available.
    let mut activities = state
        .db
        .get_activities_for_user(&user.user_id, limit.saturating_add(1), offset)
        .await?;

    let has_more = activities.len() > limit as usize;
    activities.truncate(limit as usize);

    Ok(Json(ActivitiesResponse {
        activities,
        per_page: limit,
        next_cursor: has_more.then(|| encode_cursor(offset.saturating_add(limit))),
    }))
}

// ─── Drops ───────────────────────────────────────────────────

/// Published drops, newest release first.
async fn list_drops(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ProductDrop>>> {
    Ok(Json(state.db.list_drops(true).await?))
}

#[derive(Serialize)]
pub struct DropAccessResponse {
    pub drop_id: String,
    pub has_access: bool,
    pub grant: Option<DropAccess>,
}

/// Whether the caller holds a grant for this drop.
async fn get_drop_access(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(drop_id): Path<String>,
) -> Result<Json<DropAccessResponse>> {
    if state.db.get_drop(&drop_id).await?.is_none() {
        return Err(AppError::DropNotFound(drop_id));
    }

    let grant = state.db.get_drop_access(&drop_id, &user.user_id).await?;

    Ok(Json(DropAccessResponse {
        has_access: grant.is_some(),
        drop_id,
        grant,
    }))
}

/// Record that the caller has seen their grant.
async fn mark_viewed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(drop_id): Path<String>,
) -> Result<Json<DropAccess>> {
    let grant = state
        .db
        .mark_drop_access_viewed(&drop_id, &user.user_id, chrono::Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No access grant for drop {}", drop_id)))?;

    Ok(Json(grant))
}
