// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Operator routes: drop management, grants, recalculation and deletion.

use crate::error::{AppError, Result};
use crate::models::{DropInput, MileageSummary, ProductDrop};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

/// Operator routes. The operator key middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/drops", get(list_drops).post(create_drop))
        .route("/admin/drops/{drop_id}", put(update_drop).delete(delete_drop))
        .route("/admin/drops/{drop_id}/grant", post(grant_drop))
        .route("/admin/users/{user_id}/recalculate", post(recalculate))
        .route("/admin/users/{user_id}", delete(delete_user))
}

fn validate_input(input: &DropInput) -> Result<()> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid drop: {}", e)))
}

/// Every drop, including unpublished ones.
async fn list_drops(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ProductDrop>>> {
    Ok(Json(state.db.list_drops(false).await?))
}

/// Create a drop; the slug must be unused.
async fn create_drop(
    State(state): State<Arc<AppState>>,
    Json(input): Json<DropInput>,
) -> Result<(StatusCode, Json<ProductDrop>)> {
    validate_input(&input)?;

    let drop = ProductDrop::from_input(input, chrono::Utc::now());
    if !state.db.create_drop(&drop).await? {
        return Err(AppError::BadRequest(format!(
            "Drop slug '{}' already exists",
            drop.slug
        )));
    }

    tracing::info!(drop_id = %drop.slug, "Drop created");
    Ok((StatusCode::CREATED, Json(drop)))
}

/// Update a drop. The slug in the path wins; the body's slug must match.
async fn update_drop(
    State(state): State<Arc<AppState>>,
    Path(drop_id): Path<String>,
    Json(input): Json<DropInput>,
) -> Result<Json<ProductDrop>> {
    validate_input(&input)?;
    if input.slug != drop_id {
        return Err(AppError::BadRequest("Drop slug cannot be changed".to_string()));
    }

    let mut drop = state
        .db
        .get_drop(&drop_id)
        .await?
        .ok_or_else(|| AppError::DropNotFound(drop_id.clone()))?;

    drop.apply_input(input, chrono::Utc::now());
    state.db.update_drop(&drop).await?;

    tracing::info!(drop_id = %drop_id, "Drop updated");
    Ok(Json(drop))
}

#[derive(Serialize)]
pub struct DeleteDropResponse {
    pub drop_id: String,
    pub grants_deleted: usize,
}

/// Delete a drop together with its grants.
async fn delete_drop(
    State(state): State<Arc<AppState>>,
    Path(drop_id): Path<String>,
) -> Result<Json<DeleteDropResponse>> {
    if state.db.get_drop(&drop_id).await?.is_none() {
        return Err(AppError::DropNotFound(drop_id));
    }

    let grants_deleted = state.db.delete_drop(&drop_id).await?;
    Ok(Json(DeleteDropResponse {
        drop_id,
        grants_deleted,
    }))
}

#[derive(Serialize)]
pub struct GrantResponse {
    pub drop_id: String,
    pub granted_count: u32,
}

/// Grant access to every currently qualifying user.
async fn grant_drop(
    State(state): State<Arc<AppState>>,
    Path(drop_id): Path<String>,
) -> Result<Json<GrantResponse>> {
    let granted_count = state.qualifier.grant_access(&drop_id).await?;
    Ok(Json(GrantResponse {
        drop_id,
        granted_count,
    }))
}

/// Rebuild one user's mileage summary.
async fn recalculate(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<MileageSummary>> {
    Ok(Json(state.aggregator.recalculate(&user_id).await?))
}

#[derive(Serialize)]
pub struct DeleteUserResponse {
    pub user_id: String,
    pub deleted_documents: usize,
}

/// Remove a user and everything that references them.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteUserResponse>> {
    tracing::info!(user_id = %user_id, "Operator-initiated user deletion");

    let deleted_documents = state.db.delete_user_data(&user_id).await?;
    state.strava_service.forget_user(&user_id);

    Ok(Json(DeleteUserResponse {
        user_id,
        deleted_documents,
    }))
}
