// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user mileage summary and access tier derivation.
//!
//! A summary is always rebuilt from the full set of a user's activity
//! records; nothing is adjusted incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::ActivityRecord;
use crate::time_utils::{month_start, previous_month_start, year_start};
use crate::units::round_hundredths;

/// Current-month miles needed for each tier.
pub const BASIC_TIER_MILES: f64 = 50.0;
pub const PREMIUM_TIER_MILES: f64 = 100.0;
pub const EXCLUSIVE_TIER_MILES: f64 = 150.0;

/// Access tier, ordered `None < Basic < Premium < Exclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    None,
    Basic,
    Premium,
    Exclusive,
}

impl AccessTier {
    /// Tier earned by a given current-month in-region distance (miles).
    pub fn from_current_month_miles(miles: f64) -> Self {
        if miles >= EXCLUSIVE_TIER_MILES {
            AccessTier::Exclusive
        } else if miles >= PREMIUM_TIER_MILES {
            AccessTier::Premium
        } else if miles >= BASIC_TIER_MILES {
            AccessTier::Basic
        } else {
            AccessTier::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::None => "none",
            AccessTier::Basic => "basic",
            AccessTier::Premium => "premium",
            AccessTier::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mileage summary for one user (document ID = user id).
///
/// `current_month_miles` and `access_tier` are private so they can only be
/// changed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MileageSummary {
    pub user_id: String,
    current_month_miles: f64,
    pub previous_month_miles: f64,
    pub current_year_miles: f64,
    pub all_time_miles: f64,
    /// All stored activities, regardless of region or date
    pub total_activities: u32,
    /// Stored activities that started inside the region
    pub region_activities: u32,
    /// Start of the most recent stored activity
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    access_tier: AccessTier,
    pub last_calculated_at: DateTime<Utc>,
}

impl MileageSummary {
    /// An empty summary (no activities).
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_month_miles: 0.0,
            previous_month_miles: 0.0,
            current_year_miles: 0.0,
            all_time_miles: 0.0,
            total_activities: 0,
            region_activities: 0,
            last_activity_at: None,
            access_tier: AccessTier::None,
            last_calculated_at: now,
        }
    }

    /// Rebuild a summary from every activity record the user has.
    pub fn from_activities(user_id: &str, activities: &[ActivityRecord], now: DateTime<Utc>) -> Self {
        let this_month = month_start(now);
        let last_month = previous_month_start(now);
        let this_year = year_start(now);

        let mut summary = Self::new(user_id, now);
        let mut current_month = 0.0;

        for activity in activities {
            summary.total_activities += 1;
            summary.last_activity_at = summary.last_activity_at.max(Some(activity.start_date));

            if !activity.in_region {
                continue;
            }

            summary.region_activities += 1;
            summary.all_time_miles += activity.distance_miles;

            let started = activity.start_date;
            if started >= this_month {
                current_month += activity.distance_miles;
            } else if started >= last_month {
                summary.previous_month_miles += activity.distance_miles;
            }
            if started >= this_year {
                summary.current_year_miles += activity.distance_miles;
            }
        }

        summary.previous_month_miles = round_hundredths(summary.previous_month_miles);
        summary.current_year_miles = round_hundredths(summary.current_year_miles);
        summary.all_time_miles = round_hundredths(summary.all_time_miles);
        summary.set_current_month_miles(current_month);
        summary
    }

    pub fn current_month_miles(&self) -> f64 {
        self.current_month_miles
    }

    /// Current-month miles as seen at `now`.
    ///
    /// A summary last calculated in an earlier month describes that month,
    /// so nothing has been counted for this one yet.
    pub fn current_month_miles_at(&self, now: DateTime<Utc>) -> f64 {
        if self.last_calculated_at < month_start(now) {
            0.0
        } else {
            self.current_month_miles
        }
    }

    pub fn access_tier(&self) -> AccessTier {
        self.access_tier
    }

    /// Set current-month miles; the tier is re-derived in the same step.
    pub fn set_current_month_miles(&mut self, miles: f64) {
        self.current_month_miles = round_hundredths(miles);
        self.access_tier = AccessTier::from_current_month_miles(self.current_month_miles);
    }
}
