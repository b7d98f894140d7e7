// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and connection state)
//! - Tokens (encrypted Strava credentials)
//! - Activities (imported Strava runs)
//! - Mileage summaries (one per user)
//! - Drops and drop access grants
//!
//! Create-if-absent writes use Firestore's create precondition: a document
//! that already exists is reported as `false`, not as an error.

use crate::db::{collections, doc_id, drop_access_doc_id};
use crate::error::AppError;
use crate::models::{ActivityRecord, DropAccess, MileageSummary, ProductDrop, User, UserTokens};
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::{paths, FirestoreWritePrecondition};
use futures_util::{stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Helpers ─────────────────────────────────────────

    async fn get_by_id<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write a whole document, replacing whatever was there.
    async fn set_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Create a document unless one with the same ID already exists.
    ///
    /// Returns `true` if the document was created, `false` if it was present.
    async fn insert_if_absent<T>(
        &self,
        collection: &str,
        id: &str,
        object: &T,
    ) -> Result<bool, AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let result: Result<T, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by identity provider id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_by_id(collections::USERS, &doc_id(user_id)).await
    }

    /// Create or replace a user profile.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.set_doc(collections::USERS, &doc_id(&user.user_id), user)
            .await
    }

    /// Create the (unconnected) user row if it does not exist yet.
    pub async fn create_user_if_absent(&self, user: &User) -> Result<bool, AppError> {
        self.insert_if_absent(collections::USERS, &doc_id(&user.user_id), user)
            .await
    }

    /// Find the user connected to a Strava athlete.
    pub async fn find_user_by_athlete_id(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("strava_athlete_id").eq(athlete_id))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    /// Record the time of the latest import.
    ///
    /// Only `last_sync_at` is written, so a grant applied concurrently keeps
    /// its profile fields. The user document must already exist.
    pub async fn set_last_sync(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut user = User::new(user_id, at);
        user.last_sync_at = Some(at);

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(User::{last_sync_at}))
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(doc_id(user_id))
            .object(&user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get encrypted tokens for a user.
    pub async fn get_tokens(&self, user_id: &str) -> Result<Option<UserTokens>, AppError> {
        self.get_by_id(collections::TOKENS, &doc_id(user_id)).await
    }

    /// Store encrypted tokens for a user.
    ///
    /// The pair and its expiry live in one document, so this single write
    /// replaces all three together.
    pub async fn set_tokens(&self, user_id: &str, tokens: &UserTokens) -> Result<(), AppError> {
        self.set_doc(collections::TOKENS, &doc_id(user_id), tokens)
            .await
    }

    /// Store a freshly granted credential pair and the updated profile in
    /// one transaction.
    pub async fn apply_grant_atomic(&self, user: &User, tokens: &UserTokens) -> Result<(), AppError> {
        let client = self.get_client()?;
        let id = doc_id(&user.user_id);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(&id)
            .object(tokens)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add tokens to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(())
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get an activity by Strava ID.
    pub async fn get_activity(&self, activity_id: u64) -> Result<Option<ActivityRecord>, AppError> {
        self.get_by_id(collections::ACTIVITIES, &activity_id.to_string())
            .await
    }

    /// Store an activity unless one with the same Strava ID already exists.
    ///
    /// Returns `true` if inserted, `false` if it was already present.
    pub async fn insert_activity_if_absent(
        &self,
        activity: &ActivityRecord,
    ) -> Result<bool, AppError> {
        self.insert_if_absent(
            collections::ACTIVITIES,
            &activity.strava_activity_id.to_string(),
            activity,
        )
        .await
    }

    /// Get a page of a user's activities, newest first.
    pub async fn get_activities_for_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ActivityRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| q.field("user_id").eq(user_id))
            .order_by([("start_date", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get every activity a user has (for full recalculation).
    pub async fn get_all_activities_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ActivityRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| q.field("user_id").eq(user_id))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Mileage Summary Operations ──────────────────────────────

    pub async fn get_mileage_summary(
        &self,
        user_id: &str,
    ) -> Result<Option<MileageSummary>, AppError> {
        self.get_by_id(collections::MILEAGE_SUMMARIES, &doc_id(user_id))
            .await
    }

    /// Replace a user's summary wholesale.
    pub async fn set_mileage_summary(&self, summary: &MileageSummary) -> Result<(), AppError> {
        self.set_doc(
            collections::MILEAGE_SUMMARIES,
            &doc_id(&summary.user_id),
            summary,
        )
        .await
    }

    /// Summaries whose current-month miles are at least `min_miles`.
    pub async fn get_summaries_at_or_above(
        &self,
        min_miles: f64,
    ) -> Result<Vec<MileageSummary>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MILEAGE_SUMMARIES)
            .filter(move |q| q.field("current_month_miles").greater_than_or_equal(min_miles))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Drop Operations ─────────────────────────────────────────

    pub async fn get_drop(&self, drop_id: &str) -> Result<Option<ProductDrop>, AppError> {
        self.get_by_id(collections::DROPS, &doc_id(drop_id)).await
    }

    /// Create a drop. Returns `false` if the slug is already taken.
    pub async fn create_drop(&self, drop: &ProductDrop) -> Result<bool, AppError> {
        self.insert_if_absent(collections::DROPS, &doc_id(&drop.slug), drop)
            .await
    }

    pub async fn update_drop(&self, drop: &ProductDrop) -> Result<(), AppError> {
        self.set_doc(collections::DROPS, &doc_id(&drop.slug), drop)
            .await
    }

    /// List drops, optionally only published ones, by release date.
    pub async fn list_drops(&self, published_only: bool) -> Result<Vec<ProductDrop>, AppError> {
        let mut drops: Vec<ProductDrop> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DROPS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Drops are few; filter in memory.
        if published_only {
            drops.retain(|d| d.published);
        }
        drops.sort_by(|a, b| b.release_at.cmp(&a.release_at));
        Ok(drops)
    }

    /// Delete a drop and every grant issued for it.
    ///
    /// Returns the number of grants removed.
    pub async fn delete_drop(&self, drop_id: &str) -> Result<usize, AppError> {
        let grants = self.get_drop_access_for_drop(drop_id).await?;
        let count = grants.len();

        self.batch_delete(&grants, collections::DROP_ACCESS, |g: &DropAccess| {
            drop_access_doc_id(&g.drop_id, &g.user_id)
        })
        .await?;

        self.delete_doc(collections::DROPS, &doc_id(drop_id)).await?;

        tracing::info!(drop_id, grants_deleted = count, "Drop deleted");
        Ok(count)
    }

    // ─── Drop Access Operations ──────────────────────────────────

    pub async fn get_drop_access(
        &self,
        drop_id: &str,
        user_id: &str,
    ) -> Result<Option<DropAccess>, AppError> {
        self.get_by_id(
            collections::DROP_ACCESS,
            &drop_access_doc_id(drop_id, user_id),
        )
        .await
    }

    /// Insert grants concurrently, leaving existing grants untouched.
    ///
    /// Returns how many were newly created.
    pub async fn insert_drop_access_if_absent(
        &self,
        grants: &[DropAccess],
    ) -> Result<usize, AppError> {
        let created = stream::iter(grants.to_vec())
            .map(|grant| async move {
                self.insert_if_absent(
                    collections::DROP_ACCESS,
                    &drop_access_doc_id(&grant.drop_id, &grant.user_id),
                    &grant,
                )
                .await
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<bool, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<bool>, AppError>>()?;

        Ok(created.into_iter().filter(|c| *c).count())
    }

    pub async fn get_drop_access_for_drop(
        &self,
        drop_id: &str,
    ) -> Result<Vec<DropAccess>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::DROP_ACCESS)
            .filter(|q| q.field("drop_id").eq(drop_id))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Stamp `viewed_at` on a grant the first time the user sees it.
    ///
    /// Only the timestamp is written; tier and mileage stay frozen. A grant
    /// deleted in the meantime is not recreated.
    pub async fn mark_drop_access_viewed(
        &self,
        drop_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<DropAccess>, AppError> {
        let Some(mut grant) = self.get_drop_access(drop_id, user_id).await? else {
            return Ok(None);
        };

        if grant.viewed_at.is_some() {
            return Ok(Some(grant));
        }
        grant.viewed_at = Some(at);

        let result: Result<(), FirestoreError> = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(DropAccess::{viewed_at}))
            .in_col(collections::DROP_ACCESS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(drop_access_doc_id(drop_id, user_id))
            .object(&grant)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(Some(grant)),
            Err(FirestoreError::DataNotFoundError(_)) => Ok(None),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── User Data Deletion ────────────────────────────────────────

    /// Delete ALL data for a user.
    ///
    /// Deletes from all collections:
    /// - `drop_access` (query by user_id)
    /// - `activities` (query by user_id)
    /// - `mileage_summaries/{user_id}`
    /// - `tokens/{user_id}`
    /// - `users/{user_id}`
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Drop access grants
        let grants: Vec<DropAccess> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DROP_ACCESS)
            .filter(|q| q.field("user_id").eq(user_id))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count = grants.len();
        self.batch_delete(&grants, collections::DROP_ACCESS, |g: &DropAccess| {
            drop_access_doc_id(&g.drop_id, &g.user_id)
        })
        .await?;
        deleted_count += count;
        tracing::debug!(user_id, count, "Deleted drop access grants");

        // 2. Activities
        let activities = self.get_all_activities_for_user(user_id).await?;
        let count = activities.len();
        self.batch_delete(
            &activities,
            collections::ACTIVITIES,
            |activity: &ActivityRecord| activity.strava_activity_id.to_string(),
        )
        .await?;
        deleted_count += count;
        tracing::debug!(user_id, count, "Deleted activities");

        // 3. Summary, tokens, profile
        let id = doc_id(user_id);
        for collection in [
            collections::MILEAGE_SUMMARIES,
            collections::TOKENS,
            collections::USERS,
        ] {
            self.delete_doc(collection, &id).await?;
            deleted_count += 1;
        }

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
