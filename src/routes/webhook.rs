// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::middleware::operator::keys_match;
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode == "subscribe"
        && keys_match(&params.verify_token, &state.config.webhook_verify_token)
    {
        tracing::info!("Webhook subscription verified");
        (
            StatusCode::OK,
            Json(VerifyResponse {
                challenge: params.challenge,
            }),
        )
    } else {
        tracing::warn!(mode = %params.mode, "Webhook verification failed: invalid token");
        (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
    }
}

/// Strava webhook event payload.
#[derive(Deserialize, Debug)]
pub struct WebhookEvent {
    pub object_type: String, // "activity" or "athlete"
    pub object_id: u64,
    pub aspect_type: String, // "create", "update", "delete"
    pub owner_id: u64,
    /// For athlete events, contains {"authorized": "false"} on deauthorization
    #[serde(default)]
    pub updates: Option<std::collections::HashMap<String, serde_json::Value>>,
}

impl WebhookEvent {
    /// New or edited activities are imported individually.
    pub fn triggers_import(&self) -> bool {
        self.object_type == "activity"
            && matches!(self.aspect_type.as_str(), "create" | "update")
    }

    /// Strava sends: object_type="athlete", aspect_type="update", updates={"authorized": "false"}
    pub fn is_deauthorization(&self) -> bool {
        self.object_type == "athlete"
            && self
                .updates
                .as_ref()
                .and_then(|u| u.get("authorized"))
                .is_some_and(|v| v == false || v == "false")
    }
}

/// Handle incoming webhook events (POST).
///
/// Always answers 200 so Strava does not retry; failures are logged.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK;
        }
    };

    tracing::info!(
        object_type = %event.object_type,
        object_id = event.object_id,
        aspect_type = %event.aspect_type,
        owner_id = event.owner_id,
        "Webhook event received"
    );

    if event.is_deauthorization() {
        // Stored credentials are kept; the next refresh will fail and the
        // user is asked to reconnect.
        tracing::info!(athlete_id = event.owner_id, "Athlete deauthorized the app");
        return StatusCode::OK;
    }

    if !event.triggers_import() {
        tracing::debug!("Ignoring webhook event");
        return StatusCode::OK;
    }

    let user = match state.db.find_user_by_athlete_id(event.owner_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::info!(athlete_id = event.owner_id, "Webhook for unknown athlete");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to look up athlete");
            return StatusCode::OK;
        }
    };

    let importer = state.importer.clone();
    let activity_id = event.object_id;
    tokio::spawn(async move {
        if let Err(e) = importer.import_activity(&user.user_id, activity_id).await {
            tracing::warn!(
                user_id = %user.user_id,
                activity_id,
                error = %e,
                retryable = e.is_retryable(),
                "Webhook import failed"
            );
        }
    });

    StatusCode::OK
}
