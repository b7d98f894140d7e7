// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drop qualification: issues frozen access grants to users whose
//! current-month mileage meets a drop's thresholds.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{DropAccess, MileageSummary, ProductDrop};
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct DropQualifier {
    db: FirestoreDb,
}

impl DropQualifier {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Grant access to every qualifying user.
    ///
    /// Existing grants are left as they are. Returns the number of grants
    /// the drop has afterwards.
    pub async fn grant_access(&self, drop_id: &str) -> Result<u32> {
        let drop = self
            .db
            .get_drop(drop_id)
            .await?
            .ok_or_else(|| AppError::DropNotFound(drop_id.to_string()))?;

        let lowest = drop
            .thresholds
            .basic
            .min(drop.thresholds.premium)
            .min(drop.thresholds.exclusive);
        let summaries = self.db.get_summaries_at_or_above(lowest).await?;

        let grants = plan_grants(&drop, &summaries, Utc::now());
        let created = self.db.insert_drop_access_if_absent(&grants).await?;
        let total = self.db.get_drop_access_for_drop(drop_id).await?.len() as u32;

        tracing::info!(
            drop_id,
            candidates = summaries.len(),
            created,
            total,
            "Drop access granted"
        );

        Ok(total)
    }

    /// Whether a grant exists for the user on this drop.
    pub async fn has_access(&self, user_id: &str, drop_id: &str) -> Result<bool> {
        Ok(self.db.get_drop_access(drop_id, user_id).await?.is_some())
    }
}

/// Build a grant at the highest tier each summary qualifies for.
///
/// Summaries not recalculated this month count as zero miles.
pub fn plan_grants(
    drop: &ProductDrop,
    summaries: &[MileageSummary],
    now: DateTime<Utc>,
) -> Vec<DropAccess> {
    summaries
        .iter()
        .filter_map(|summary| {
            let miles = summary.current_month_miles_at(now);
            drop.thresholds.tier_for(miles).map(|tier| DropAccess {
                drop_id: drop.slug.clone(),
                user_id: summary.user_id.clone(),
                tier,
                mileage_at_qualification: miles,
                qualified_at: now,
                notified_at: None,
                viewed_at: None,
            })
        })
        .collect()
}
