// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use district_miles::config::Config;
use district_miles::db::FirestoreDb;
use district_miles::routes::create_router;
use district_miles::services::{Geofence, KmsService};
use district_miles::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// A bare emulator client, for writing documents the crate itself never
/// would (such as malformed records).
#[allow(dead_code)]
pub async fn raw_emulator_client() -> firestore::FirestoreDb {
    let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
        Ok(gcloud_sdk::Token {
            token_type: "Bearer".to_string(),
            token: gcloud_sdk::SecretValue::new(
                "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                    .to_string()
                    .into(),
            ),
            expiry: Utc::now() + chrono::Duration::hours(1),
        })
    });

    firestore::FirestoreDb::with_options_token_source(
        firestore::FirestoreDbOptions::new("test-project".to_string()),
        gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
        gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
    )
    .await
    .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

#[allow(dead_code)]
pub fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC3339 timestamp")
        .with_timezone(&Utc)
}

/// A user id nobody else in this emulator run will use.
#[allow(dead_code)]
pub fn unique_user_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

/// Sign a session token the way the identity provider does.
#[allow(dead_code)]
pub fn session_jwt(user_id: &str, signing_key: &[u8]) -> String {
    use district_miles::middleware::auth::Claims;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 7 * 24 * 60 * 60,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .expect("encode session token")
}

/// Build shared state around the given config and database.
#[allow(dead_code)]
pub fn test_state(config: Config, db: FirestoreDb) -> Arc<AppState> {
    Arc::new(
        AppState::new(config, db, KmsService::new_mock(), Geofence::default())
            .expect("Failed to build app state"),
    )
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = test_state(Config::test_default(), test_db_offline());
    (create_router(state.clone()), state)
}

// ─── Mock Strava ─────────────────────────────────────────────

/// Behaviour knobs and call counters for the mock Strava server.
#[derive(Default)]
pub struct MockStravaState {
    pub activities: Mutex<Vec<Value>>,
    /// Largest page Strava will return, whatever was asked for (0 = no cap)
    pub max_per_page: AtomicU32,
    /// First listing page answered with a 503 (0 = never)
    pub fail_from_page: AtomicU32,
    pub refresh_fails: AtomicBool,
    pub refresh_calls: AtomicU32,
    pub list_calls: AtomicU32,
}

/// Minimal Strava API served on an ephemeral local port.
#[allow(dead_code)]
pub struct MockStrava {
    pub base_url: String,
    pub state: Arc<MockStravaState>,
}

#[allow(dead_code)]
impl MockStrava {
    pub async fn start() -> Self {
        let state = Arc::new(MockStravaState::default());

        let app = Router::new()
            .route("/api/v3/athlete/activities", get(list_activities))
            .route("/api/v3/activities/{id}", get(get_activity))
            .route("/oauth/token", post(token))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock Strava");
        let addr = listener.local_addr().expect("mock Strava address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock Strava server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Config pointing the Strava client at this server.
    pub fn config(&self) -> Config {
        let mut config = Config::test_default();
        config.strava_api_base_url = format!("{}/api/v3", self.base_url);
        config.strava_oauth_base_url = format!("{}/oauth", self.base_url);
        config.strava_timeout_secs = 5;
        config
    }

    pub fn set_activities(&self, activities: Vec<Value>) {
        *self.state.activities.lock().unwrap() = activities;
    }
}

/// A Strava activity summary as the list endpoint returns it.
#[allow(dead_code)]
pub fn strava_activity(
    id: u64,
    sport_type: &str,
    meters: f64,
    start: DateTime<Utc>,
    latlng: Option<(f64, f64)>,
) -> Value {
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "type": sport_type,
        "sport_type": sport_type,
        "start_date": start.to_rfc3339(),
        "distance": meters,
        "moving_time": 1800,
        "elapsed_time": 1900,
        "total_elevation_gain": 12.0,
        "average_speed": 3.1,
        "max_speed": 4.2,
        "start_latlng": latlng.map(|(lat, lng)| vec![lat, lng]).unwrap_or_default(),
        "manual": false
    })
}

async fn list_activities(
    State(state): State<Arc<MockStravaState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, StatusCode> {
    state.list_calls.fetch_add(1, Ordering::SeqCst);

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let mut per_page: usize = params
        .get("per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(30);

    let fail_from = state.fail_from_page.load(Ordering::SeqCst) as usize;
    if fail_from != 0 && page >= fail_from {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let cap = state.max_per_page.load(Ordering::SeqCst) as usize;
    if cap != 0 {
        per_page = per_page.min(cap);
    }

    let all = state.activities.lock().unwrap();
    let items = all
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();
    Ok(Json(items))
}

async fn get_activity(
    State(state): State<Arc<MockStravaState>>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, StatusCode> {
    let all = state.activities.lock().unwrap();
    let found = all.iter().find(|a| a["id"].as_u64() == Some(id)).cloned();
    found.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn token(
    State(state): State<Arc<MockStravaState>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let expires_at = Utc::now().timestamp() + 6 * 3600;

    match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => {
            state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if state.refresh_fails.load(Ordering::SeqCst) {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "message": "Bad Request",
                        "errors": [{"resource": "RefreshToken", "field": "refresh_token", "code": "invalid"}]
                    })),
                );
            }
            (
                StatusCode::OK,
                Json(json!({
                    "token_type": "Bearer",
                    "access_token": "refreshed-access",
                    "refresh_token": "refreshed-refresh",
                    "expires_at": expires_at
                })),
            )
        }
        Some("authorization_code") => (
            StatusCode::OK,
            Json(json!({
                "token_type": "Bearer",
                "access_token": "exchanged-access",
                "refresh_token": "exchanged-refresh",
                "expires_at": expires_at,
                "athlete": {
                    "id": 777,
                    "firstname": "Sam",
                    "lastname": "Runner",
                    "profile": "https://example.com/sam.jpg",
                    "city": "Washington",
                    "state": "DC"
                }
            })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "unsupported grant_type"})),
        ),
    }
}
