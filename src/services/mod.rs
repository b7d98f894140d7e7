// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod drops;
pub mod geofence;
pub mod importer;
pub mod kms;
pub mod mileage;
pub mod strava;

pub use drops::DropQualifier;
pub use geofence::{Geofence, GeofenceError};
pub use importer::{ActivityImporter, ImportOptions, ImportResult};
pub use kms::KmsService;
pub use mileage::MileageAggregator;
pub use strava::{StravaClient, StravaService};
