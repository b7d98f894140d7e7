// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod drop;
pub mod summary;
pub mod user;

pub use activity::ActivityRecord;
pub use drop::{ProductDrop, DropAccess, DropInput, TierThresholds};
pub use summary::{AccessTier, MileageSummary};
pub use user::{AthleteProfile, OAuthGrant, User, UserTokens};
