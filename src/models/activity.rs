// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Imported activity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sport types that count toward mileage. Matched case-sensitively.
pub const QUALIFYING_SPORT_TYPES: [&str; 3] = ["Run", "TrailRun", "VirtualRun"];

/// Stored activity record in Firestore.
///
/// `in_region` is derived once, when the record is written, from the start
/// coordinates. It is never recomputed for an existing record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    /// Strava activity ID (also used as document ID)
    pub strava_activity_id: u64,
    /// Owning user (identity provider id)
    pub user_id: String,
    /// Activity name/title
    pub name: String,
    /// Sport type (Run, TrailRun, VirtualRun)
    pub sport_type: String,
    /// Start date/time
    pub start_date: DateTime<Utc>,
    /// Distance in meters (as reported by Strava)
    pub distance_meters: f64,
    /// Distance in miles, rounded to hundredths
    pub distance_miles: f64,
    #[serde(default)]
    pub moving_time_secs: u64,
    #[serde(default)]
    pub elapsed_time_secs: u64,
    /// Elevation gain in meters
    #[serde(default)]
    pub elevation_gain_meters: f64,
    /// Average speed in meters/second
    #[serde(default)]
    pub average_speed: f64,
    /// Max speed in meters/second
    #[serde(default)]
    pub max_speed: f64,
    #[serde(default)]
    pub start_lat: Option<f64>,
    #[serde(default)]
    pub start_lng: Option<f64>,
    /// "City, State" when Strava reports it
    #[serde(default)]
    pub place_name: Option<String>,
    /// Whether the start point falls inside the eligible region
    #[serde(default)]
    pub in_region: bool,
    /// Manually entered (no GPS)
    #[serde(default)]
    pub manual: bool,
    /// When this activity was imported
    pub imported_at: DateTime<Utc>,
}

/// Whether a Strava activity counts toward mileage.
///
/// Either kind field may carry the match: newer payloads populate
/// `sport_type`, older ones only `type`.
pub fn is_qualifying_kind(sport_type: Option<&str>, legacy_type: Option<&str>) -> bool {
    [sport_type, legacy_type]
        .into_iter()
        .flatten()
        .any(|kind| QUALIFYING_SPORT_TYPES.contains(&kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_kinds_qualify() {
        assert!(is_qualifying_kind(Some("Run"), None));
        assert!(is_qualifying_kind(Some("TrailRun"), None));
        assert!(is_qualifying_kind(Some("VirtualRun"), None));
    }

    #[test]
    fn test_either_field_matches() {
        assert!(is_qualifying_kind(Some("Workout"), Some("Run")));
        assert!(is_qualifying_kind(None, Some("VirtualRun")));
        assert!(is_qualifying_kind(Some("TrailRun"), Some("Hike")));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert!(!is_qualifying_kind(Some("run"), Some("RUN")));
        assert!(!is_qualifying_kind(Some("trailrun"), None));
    }

    #[test]
    fn test_other_sports_rejected() {
        assert!(!is_qualifying_kind(Some("Ride"), Some("Ride")));
        assert!(!is_qualifying_kind(Some("Walk"), None));
        assert!(!is_qualifying_kind(None, None));
    }
}
