// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity import workflow.
//!
//! 1. Obtain a valid Strava credential
//! 2. Page through activities since the last sync until an empty page
//! 3. Keep runs, convert units, classify region
//! 4. Insert each record unless it already exists
//! 5. Stamp last-sync, then recalculate the mileage summary

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::activity::is_qualifying_kind;
use crate::models::ActivityRecord;
use crate::services::strava::StravaActivitySummary;
use crate::services::{Geofence, MileageAggregator, StravaService};
use crate::units::meters_to_miles;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Stop paging after this many pages even if Strava keeps returning full ones.
const MAX_IMPORT_PAGES: u32 = 100;

/// Tunables for an import run.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub lookback_days: i64,
    pub page_size: u32,
    pub max_pages: u32,
}

impl ImportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lookback_days: config.import_lookback_days,
            page_size: config.import_page_size,
            max_pages: MAX_IMPORT_PAGES,
        }
    }
}

/// Outcome of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ImportResult {
    /// Qualifying activities returned by Strava
    pub fetched: u32,
    /// Newly stored activities
    pub inserted: u32,
    /// Activities that were already stored
    pub skipped: u32,
}

/// Pulls a user's runs from Strava into the activity store.
#[derive(Clone)]
pub struct ActivityImporter {
    strava: StravaService,
    db: FirestoreDb,
    geofence: Geofence,
    aggregator: MileageAggregator,
    options: ImportOptions,
}

impl ActivityImporter {
    pub fn new(
        strava: StravaService,
        db: FirestoreDb,
        geofence: Geofence,
        options: ImportOptions,
    ) -> Self {
        Self {
            strava,
            aggregator: MileageAggregator::new(db.clone()),
            db,
            geofence,
            options,
        }
    }

    /// Import the user's runs since their last sync.
    ///
    /// Fails with `NotConnected` or `RefreshFailed` before anything is
    /// written. A failed summary recalculation is only logged.
    pub async fn import_activities(&self, user_id: &str) -> Result<ImportResult> {
        let access_token = self.strava.get_valid_access_token(user_id).await?;

        let now = Utc::now();
        let last_sync = self
            .db
            .get_user(user_id)
            .await?
            .and_then(|u| u.last_sync_at);
        let horizon = fetch_horizon(last_sync, now, self.options.lookback_days);

        tracing::info!(user_id, horizon = %horizon, "Starting activity import");

        let mut result = ImportResult::default();
        let per_page = self.options.page_size;
        let mut page = 1;

        loop {
            let activities = self
                .strava
                .client()
                .list_activities(&access_token, horizon.timestamp(), page, per_page)
                .await?;
            // Strava may return fewer than `per_page` and still have more.
            if activities.is_empty() {
                break;
            }

            for summary in activities.iter().filter(|a| {
                is_qualifying_kind(a.sport_type.as_deref(), a.kind.as_deref())
            }) {
                result.fetched += 1;
                let record = build_activity_record(user_id, summary, &self.geofence, now);

                if self.db.insert_activity_if_absent(&record).await? {
                    result.inserted += 1;
                } else {
                    tracing::debug!(
                        user_id,
                        activity_id = record.strava_activity_id,
                        "Activity already stored, skipping"
                    );
                    result.skipped += 1;
                }
            }

            if page >= self.options.max_pages {
                tracing::warn!(user_id, pages = page, "Import page limit reached, stopping");
                break;
            }
            page += 1;
        }

        self.db.set_last_sync(user_id, now).await?;

        if let Err(e) = self.aggregator.recalculate(user_id).await {
            tracing::warn!(user_id, error = %e, "Mileage recalculation after import failed");
        }

        tracing::info!(
            user_id,
            fetched = result.fetched,
            inserted = result.inserted,
            skipped = result.skipped,
            "Activity import complete"
        );

        Ok(result)
    }

    /// Import one activity named by a webhook event.
    ///
    /// Unlike [`Self::import_activities`] this ignores the sync horizon, so a
    /// run recorded before the last sync but uploaded after it still lands.
    /// Returns whether a new record was stored.
    pub async fn import_activity(&self, user_id: &str, activity_id: u64) -> Result<bool> {
        let access_token = self.strava.get_valid_access_token(user_id).await?;
        let summary = self
            .strava
            .client()
            .get_activity(&access_token, activity_id)
            .await?;

        if !is_qualifying_kind(summary.sport_type.as_deref(), summary.kind.as_deref()) {
            tracing::debug!(user_id, activity_id, "Not a run, ignoring");
            return Ok(false);
        }

        let record = build_activity_record(user_id, &summary, &self.geofence, Utc::now());
        let inserted = self.db.insert_activity_if_absent(&record).await?;

        if inserted {
            if let Err(e) = self.aggregator.recalculate(user_id).await {
                tracing::warn!(user_id, error = %e, "Mileage recalculation after import failed");
            }
        }

        tracing::info!(user_id, activity_id, inserted, "Single activity import complete");
        Ok(inserted)
    }
}

/// Fetch activities started after the last sync, or after the lookback
/// window for a first import.
pub fn fetch_horizon(
    last_sync: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback_days: i64,
) -> DateTime<Utc> {
    last_sync.unwrap_or_else(|| now - Duration::days(lookback_days))
}

/// Turn a Strava summary into a stored record, classifying it once.
pub fn build_activity_record(
    user_id: &str,
    summary: &StravaActivitySummary,
    geofence: &Geofence,
    now: DateTime<Utc>,
) -> ActivityRecord {
    let (start_lat, start_lng) = summary.start_point();

    ActivityRecord {
        strava_activity_id: summary.id,
        user_id: user_id.to_string(),
        name: summary.name.clone(),
        sport_type: summary
            .sport_type
            .clone()
            .or_else(|| summary.kind.clone())
            .unwrap_or_default(),
        start_date: summary.start_date,
        distance_meters: summary.distance,
        distance_miles: meters_to_miles(summary.distance),
        moving_time_secs: summary.moving_time,
        elapsed_time_secs: summary.elapsed_time,
        elevation_gain_meters: summary.total_elevation_gain,
        average_speed: summary.average_speed,
        max_speed: summary.max_speed,
        start_lat,
        start_lng,
        place_name: summary.place_name(),
        in_region: geofence.classify(start_lat, start_lng),
        manual: summary.manual,
        imported_at: now,
    }
}
