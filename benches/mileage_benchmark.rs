use chrono::{DateTime, Duration, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use district_miles::models::{ActivityRecord, MileageSummary};
use district_miles::services::Geofence;
use district_miles::units::meters_to_miles;
use std::hint::black_box;

/// A year of near-daily runs, alternating inside and outside the region.
fn synthetic_history(now: DateTime<Utc>, count: usize) -> Vec<ActivityRecord> {
    let fence = Geofence::default();

    (0..count)
        .map(|i| {
            let (lat, lng) = if i % 3 == 0 {
                (39.29, -76.61)
            } else {
                (38.89, -77.03)
            };
            let meters = 3000.0 + (i % 17) as f64 * 750.0;

            ActivityRecord {
                strava_activity_id: i as u64,
                user_id: "bench-user".to_string(),
                name: format!("Run {}", i),
                sport_type: "Run".to_string(),
                start_date: now - Duration::hours(i as i64 * 20),
                distance_meters: meters,
                distance_miles: meters_to_miles(meters),
                moving_time_secs: 1800,
                elapsed_time_secs: 1900,
                elevation_gain_meters: 20.0,
                average_speed: 3.0,
                max_speed: 4.0,
                start_lat: Some(lat),
                start_lng: Some(lng),
                place_name: None,
                in_region: fence.contains(lat, lng),
                manual: false,
                imported_at: now,
            }
        })
        .collect()
}

fn benchmark_summary(c: &mut Criterion) {
    let now = DateTime::parse_from_rfc3339("2026-10-15T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc);
    let history = synthetic_history(now, 2000);

    let mut group = c.benchmark_group("mileage");

    group.bench_function("summary_from_2000_activities", |b| {
        b.iter(|| MileageSummary::from_activities("bench-user", black_box(&history), now))
    });

    let fence = Geofence::default();
    group.bench_function("geofence_classify", |b| {
        b.iter(|| fence.classify(black_box(Some(38.89)), black_box(Some(-77.03))))
    });

    group.finish();
}

criterion_group!(benches, benchmark_summary);
criterion_main!(benches);
