use std::time::{Duration, SystemTime};

use tempfile::tempdir;
use trod::health::{BodyMetric, SqliteHealthStore};
use trod::recorder::WorkoutRecorder;

// Recorder against the real sqlite store, end to end on a temp database.
#[test]
fn saved_workout_lands_in_sqlite_and_reads_back() {
    let dir = tempdir().unwrap();
    let store = SqliteHealthStore::with_path(dir.path().join("health.db")).unwrap();
    store.record_body_metric(BodyMetric::WeightKg, 75.0).unwrap();
    store.record_body_metric(BodyMetric::HeightCm, 178.0).unwrap();

    let mut recorder = WorkoutRecorder::new(store);
    recorder.request_authorization().unwrap();
    assert!(recorder.is_authorized);

    recorder.fetch_user_metrics();
    assert_eq!(recorder.user_weight_kg, Some(75.0));
    assert_eq!(recorder.user_height_cm, Some(178.0));

    let started_at = SystemTime::now() - Duration::from_secs(1800);
    let record = recorder
        .save_workout(3200, Duration::from_secs(1800), 2.4, started_at)
        .unwrap();

    // 3.5 × 75 × 0.5h
    assert!((record.estimated_kcal - 131.25).abs() < 1e-6);

    let recent = recorder.store().recent_workouts(5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].steps, 3200);
    assert!((recent[0].distance_km - 2.4).abs() < 1e-9);
    assert!((recent[0].estimated_kcal - record.estimated_kcal).abs() < 1e-6);
}

#[test]
fn multiple_sessions_accumulate_in_the_log() {
    let dir = tempdir().unwrap();
    let store = SqliteHealthStore::with_path(dir.path().join("health.db")).unwrap();
    let mut recorder = WorkoutRecorder::new(store);

    for i in 1..=3u64 {
        let duration = Duration::from_secs(600 * i);
        let started_at = SystemTime::now() - duration;
        recorder
            .save_workout(1000 * i, duration, 0.8 * i as f64, started_at)
            .unwrap();
    }

    let recent = recorder.store().recent_workouts(10).unwrap();
    assert_eq!(recent.len(), 3);

    let csv_path = dir.path().join("workouts.csv");
    let written = recorder.store().export_csv(&csv_path).unwrap();
    assert_eq!(written, 3);

    let contents = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(contents.lines().count(), 4); // header + 3 rows
}

#[test]
fn reopening_the_database_keeps_history() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("health.db");

    {
        let store = SqliteHealthStore::with_path(&db_path).unwrap();
        let mut recorder = WorkoutRecorder::new(store);
        let started_at = SystemTime::now() - Duration::from_secs(900);
        recorder
            .save_workout(1500, Duration::from_secs(900), 1.1, started_at)
            .unwrap();
    }

    let reopened = SqliteHealthStore::with_path(&db_path).unwrap();
    let recent = reopened.recent_workouts(5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].steps, 1500);
}
