// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! District Miles: mileage-gated access to limited apparel drops.
//!
//! This crate provides the backend API that imports runs from Strava,
//! totals in-region mileage per user, and grants drop access by tier.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod units;

use config::Config;
use db::FirestoreDb;
use services::{ActivityImporter, DropQualifier, Geofence, MileageAggregator, StravaService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub strava_service: StravaService,
    pub importer: ActivityImporter,
    pub aggregator: MileageAggregator,
    pub qualifier: DropQualifier,
}

impl AppState {
    /// Wire the services together around one database and KMS handle.
    pub fn new(
        config: Config,
        db: FirestoreDb,
        kms: services::KmsService,
        geofence: Geofence,
    ) -> error::Result<Self> {
        // Shared across every request handled by this instance
        let token_cache = std::sync::Arc::new(dashmap::DashMap::new());
        let refresh_locks = std::sync::Arc::new(dashmap::DashMap::new());

        let strava_service = StravaService::new(
            services::StravaClient::new(&config)?,
            db.clone(),
            kms,
            token_cache,
            refresh_locks,
        );

        let importer = ActivityImporter::new(
            strava_service.clone(),
            db.clone(),
            geofence,
            services::ImportOptions::from_config(&config),
        );

        Ok(Self {
            aggregator: MileageAggregator::new(db.clone()),
            qualifier: DropQualifier::new(db.clone()),
            config,
            db,
            strava_service,
            importer,
        })
    }
}
