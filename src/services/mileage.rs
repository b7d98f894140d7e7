// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mileage aggregation: rebuilds a user's summary from their activities.

use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::MileageSummary;
use chrono::{DateTime, Utc};

/// Recomputes mileage summaries by full rescan.
#[derive(Clone)]
pub struct MileageAggregator {
    db: FirestoreDb,
}

impl MileageAggregator {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Rebuild and store the user's summary as of now.
    pub async fn recalculate(&self, user_id: &str) -> Result<MileageSummary> {
        self.recalculate_at(user_id, Utc::now()).await
    }

    /// Rebuild and store the user's summary with windows anchored at `now`.
    ///
    /// Every field is overwritten, so running this twice with no new
    /// activities yields the same summary.
    pub async fn recalculate_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<MileageSummary> {
        let activities = self.db.get_all_activities_for_user(user_id).await?;
        let summary = MileageSummary::from_activities(user_id, &activities, now);

        self.db.set_mileage_summary(&summary).await?;

        tracing::info!(
            user_id,
            activities = activities.len(),
            current_month_miles = summary.current_month_miles(),
            tier = %summary.access_tier(),
            "Mileage summary recalculated"
        );

        Ok(summary)
    }
}
