// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Product drops and the access grants issued for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::AccessTier;

/// Per-tier current-month mileage thresholds for a drop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub basic: f64,
    pub premium: f64,
    pub exclusive: f64,
}

impl TierThresholds {
    /// Highest tier whose threshold `miles` meets, if any.
    pub fn tier_for(&self, miles: f64) -> Option<AccessTier> {
        if miles >= self.exclusive {
            Some(AccessTier::Exclusive)
        } else if miles >= self.premium {
            Some(AccessTier::Premium)
        } else if miles >= self.basic {
            Some(AccessTier::Basic)
        } else {
            None
        }
    }

    fn is_ascending(&self) -> bool {
        self.basic < self.premium && self.premium < self.exclusive
    }
}

/// A time-boxed product release (document ID = slug).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDrop {
    /// URL-safe slug, unique and immutable
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub release_at: DateTime<Utc>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    pub thresholds: TierThresholds,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub piece_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductDrop {
    /// Build a new drop from validated operator input.
    pub fn from_input(input: DropInput, now: DateTime<Utc>) -> Self {
        Self {
            slug: input.slug,
            name: input.name,
            description: input.description,
            release_at: input.release_at,
            end_at: input.end_at,
            thresholds: input.thresholds,
            published: input.published,
            active: input.active,
            image_url: input.image_url,
            piece_count: input.piece_count,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an operator edit. The slug is the identity and never changes.
    pub fn apply_input(&mut self, input: DropInput, now: DateTime<Utc>) {
        self.name = input.name;
        self.description = input.description;
        self.release_at = input.release_at;
        self.end_at = input.end_at;
        self.thresholds = input.thresholds;
        self.published = input.published;
        self.active = input.active;
        self.image_url = input.image_url;
        self.piece_count = input.piece_count;
        self.updated_at = now;
    }
}

/// Operator-supplied drop definition (create and update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_drop_input"))]
pub struct DropInput {
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 4000))]
    pub description: String,
    pub release_at: DateTime<Utc>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    pub thresholds: TierThresholds,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    #[validate(url)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub piece_count: Option<u32>,
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let well_formed = !slug.is_empty()
        && slug.len() <= 64
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_slug"))
    }
}

fn validate_drop_input(input: &DropInput) -> Result<(), ValidationError> {
    let t = &input.thresholds;
    if [t.basic, t.premium, t.exclusive]
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
    {
        return Err(ValidationError::new("thresholds_must_be_non_negative"));
    }
    if !t.is_ascending() {
        return Err(ValidationError::new("thresholds_must_ascend"));
    }
    if input.end_at.is_some_and(|end| end <= input.release_at) {
        return Err(ValidationError::new("end_before_release"));
    }
    Ok(())
}

/// Access grant joining a drop and a user.
///
/// Document ID: `{drop_slug}_{user_id}`. Written once; `tier` and
/// `mileage_at_qualification` are frozen from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropAccess {
    pub drop_id: String,
    pub user_id: String,
    pub tier: AccessTier,
    /// Current-month miles when the grant was issued
    pub mileage_at_qualification: f64,
    pub qualified_at: DateTime<Utc>,
    #[serde(default)]
    pub notified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(basic: f64, premium: f64, exclusive: f64) -> TierThresholds {
        TierThresholds {
            basic,
            premium,
            exclusive,
        }
    }

    fn input(slug: &str, t: TierThresholds) -> DropInput {
        DropInput {
            slug: slug.to_string(),
            name: "Fall Capsule".to_string(),
            description: String::new(),
            release_at: DateTime::parse_from_rfc3339("2026-11-01T15:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            end_at: None,
            thresholds: t,
            published: true,
            active: true,
            image_url: None,
            piece_count: Some(150),
        }
    }

    #[test]
    fn test_tier_for_picks_highest_met_threshold() {
        let t = thresholds(25.0, 60.0, 120.0);
        assert_eq!(t.tier_for(24.99), None);
        assert_eq!(t.tier_for(25.0), Some(AccessTier::Basic));
        assert_eq!(t.tier_for(59.99), Some(AccessTier::Basic));
        assert_eq!(t.tier_for(60.0), Some(AccessTier::Premium));
        assert_eq!(t.tier_for(120.0), Some(AccessTier::Exclusive));
        assert_eq!(t.tier_for(500.0), Some(AccessTier::Exclusive));
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(input("fall-capsule-2026", thresholds(25.0, 60.0, 120.0))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_bad_slug_rejected() {
        for slug in ["", "Fall", "fall capsule", "-fall", "fall-", "fall/2026"] {
            assert!(
                input(slug, thresholds(1.0, 2.0, 3.0)).validate().is_err(),
                "slug {:?} should be rejected",
                slug
            );
        }
    }

    #[test]
    fn test_thresholds_must_ascend() {
        assert!(input("a", thresholds(50.0, 50.0, 100.0)).validate().is_err());
        assert!(input("a", thresholds(100.0, 50.0, 150.0)).validate().is_err());
        assert!(input("a", thresholds(-1.0, 50.0, 150.0)).validate().is_err());
    }

    #[test]
    fn test_end_must_follow_release() {
        let mut i = input("a", thresholds(1.0, 2.0, 3.0));
        i.end_at = Some(i.release_at);
        assert!(i.validate().is_err());
    }

    #[test]
    fn test_apply_input_keeps_slug() {
        let now = Utc::now();
        let mut drop = ProductDrop::from_input(input("fall", thresholds(1.0, 2.0, 3.0)), now);
        drop.apply_input(input("renamed", thresholds(5.0, 6.0, 7.0)), now);
        assert_eq!(drop.slug, "fall");
        assert_eq!(drop.thresholds.basic, 5.0);
    }
}
