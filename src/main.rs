// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! District Miles API Server
//!
//! Imports runs from Strava, tracks in-region monthly mileage, and gates
//! access to limited apparel drops by mileage tier.

use district_miles::{
    config::Config,
    db::FirestoreDb,
    services::{Geofence, KmsService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting District Miles API");

    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let geofence = match &config.region_geojson_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading region boundary");
            Geofence::load_from_file(path)?
        }
        None => {
            tracing::info!("Using default metro region");
            Geofence::default()
        }
    };

    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        "token-encryption",
    )
    .await?;
    tracing::info!("KMS service initialized");

    let state = Arc::new(AppState::new(config.clone(), db, kms, geofence)?);

    let app = district_miles::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("district_miles=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
