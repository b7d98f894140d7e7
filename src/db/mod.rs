//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// User profile and connection state (keyed by user id)
    pub const USERS: &str = "users";
    /// Encrypted Strava credentials (keyed by user id)
    pub const TOKENS: &str = "tokens";
    /// Imported activities (keyed by Strava activity id)
    pub const ACTIVITIES: &str = "activities";
    /// Mileage summaries (keyed by user id)
    pub const MILEAGE_SUMMARIES: &str = "mileage_summaries";
    /// Product drops (keyed by slug)
    pub const DROPS: &str = "drops";
    /// Drop access grants (keyed by `{drop}_{user}`)
    pub const DROP_ACCESS: &str = "drop_access";
}

/// Encode an externally supplied id so it is a valid document ID.
pub fn doc_id(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Document ID of the grant joining `drop_id` and `user_id`.
pub fn drop_access_doc_id(drop_id: &str, user_id: &str) -> String {
    format!("{}_{}", doc_id(drop_id), doc_id(user_id))
}
