use crate::error::RecordError;
use crate::health::{
    Authorization, BodyMetric, HealthStore, SampleKind, WorkoutRecord, WorkoutSample,
};
use crate::session::SessionSnapshot;
use std::time::{Duration, SystemTime};

/// Fixed MET for treadmill walking; the estimate ignores pace
pub const WALKING_MET: f64 = 3.5;

/// Assumed body weight when the store has no weight sample
pub const DEFAULT_BODY_WEIGHT_KG: f64 = 70.0;

/// `MET x weight x hours`; deliberately ignores pace
pub fn estimated_calories(weight_kg: f64, duration: Duration) -> f64 {
    WALKING_MET * weight_kg * (duration.as_secs_f64() / 3600.0)
}

/// Turns a finished session plus a user-entered distance into a workout
/// record and submits it to the health store.
pub struct WorkoutRecorder<H: HealthStore> {
    store: H,
    pub user_weight_kg: Option<f64>,
    pub user_height_cm: Option<f64>,
    pub is_authorized: bool,
    pub authorization_error: Option<RecordError>,
}

impl<H: HealthStore> WorkoutRecorder<H> {
    pub fn new(store: H) -> Self {
        Self {
            store,
            user_weight_kg: None,
            user_height_cm: None,
            is_authorized: false,
            authorization_error: None,
        }
    }

    pub fn store(&self) -> &H {
        &self.store
    }

    /// Ask the store for write permission. Idempotent; the outcome is also
    /// kept in `is_authorized` / `authorization_error` for the UI.
    pub fn request_authorization(&mut self) -> Result<(), RecordError> {
        if !self.store.is_available() {
            self.is_authorized = false;
            self.authorization_error = Some(RecordError::HealthDataUnavailable);
            return Err(RecordError::HealthDataUnavailable);
        }
        match self.store.request_write_permission() {
            Ok(Authorization::Granted) => {
                self.is_authorized = true;
                self.authorization_error = None;
                Ok(())
            }
            Ok(Authorization::Denied) => {
                self.is_authorized = false;
                self.authorization_error = Some(RecordError::PermissionDenied);
                Err(RecordError::PermissionDenied)
            }
            Err(e) => {
                self.is_authorized = false;
                Err(RecordError::Submission(e))
            }
        }
    }

    /// Best-effort refresh of cached height/weight; metrics are optional
    /// enrichment, so failures are swallowed
    pub fn fetch_user_metrics(&mut self) {
        if let Ok(Some(weight)) = self.store.latest_sample(BodyMetric::WeightKg) {
            self.user_weight_kg = Some(weight);
        }
        if let Ok(Some(height)) = self.store.latest_sample(BodyMetric::HeightCm) {
            self.user_height_cm = Some(height);
        }
    }

    pub fn save_snapshot(
        &mut self,
        snapshot: &SessionSnapshot,
        distance_km: f64,
    ) -> Result<WorkoutRecord, RecordError> {
        self.save_workout(
            snapshot.steps,
            snapshot.duration,
            distance_km,
            snapshot.started_at,
        )
    }

    /// Submit one finished session as a workout record.
    ///
    /// The submission is staged (begin, three samples, finish); each step
    /// must succeed before the next is issued and the first failure aborts
    /// the remainder. Samples the store already accepted are not rolled
    /// back here. No retries; the user re-initiates.
    pub fn save_workout(
        &mut self,
        steps: u64,
        duration: Duration,
        distance_km: f64,
        started_at: SystemTime,
    ) -> Result<WorkoutRecord, RecordError> {
        if !self.store.is_available() {
            return Err(RecordError::HealthDataUnavailable);
        }
        if self.store.authorization() == Authorization::Denied {
            return Err(RecordError::PermissionDenied);
        }

        let weight_kg = self.user_weight_kg.unwrap_or(DEFAULT_BODY_WEIGHT_KG);
        let estimated_kcal = estimated_calories(weight_kg, duration);
        let ended_at = SystemTime::now();
        let record = WorkoutRecord {
            steps,
            duration,
            distance_km,
            estimated_kcal,
            started_at,
            ended_at,
        };

        self.store.begin_collection(started_at, ended_at)?;
        self.store.add_sample(WorkoutSample {
            kind: SampleKind::Steps,
            value: steps as f64,
            start: started_at,
            end: ended_at,
        })?;
        self.store.add_sample(WorkoutSample {
            kind: SampleKind::Distance,
            value: distance_km,
            start: started_at,
            end: ended_at,
        })?;
        self.store.add_sample(WorkoutSample {
            kind: SampleKind::Energy,
            value: estimated_kcal,
            start: started_at,
            end: ended_at,
        })?;
        self.store.finish_collection(&record)?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::health::MemoryHealthStore;
    use assert_matches::assert_matches;

    #[test]
    fn calorie_estimate_matches_the_formula() {
        // 3.5 × 70.0 × (600 / 3600)
        let kcal = estimated_calories(70.0, Duration::from_secs(600));
        assert!((kcal - 40.833_333_333).abs() < 1e-6);
    }

    #[test]
    fn save_uses_default_weight_when_unknown() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::granted());
        let started_at = SystemTime::now() - Duration::from_secs(600);

        let record = recorder
            .save_workout(1000, Duration::from_secs(600), 1.0, started_at)
            .unwrap();

        assert!((record.estimated_kcal - 40.833_333_333).abs() < 1e-6);
        assert_eq!(record.steps, 1000);
        assert_eq!(record.started_at, started_at);
        // ended_at stamped at save time
        assert!(record.ended_at.elapsed().unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn save_uses_fetched_weight_when_known() {
        let store = MemoryHealthStore::granted().with_metric(BodyMetric::WeightKg, 80.0);
        let mut recorder = WorkoutRecorder::new(store);
        recorder.fetch_user_metrics();
        assert_eq!(recorder.user_weight_kg, Some(80.0));

        let record = recorder
            .save_workout(
                1000,
                Duration::from_secs(3600),
                2.0,
                SystemTime::now() - Duration::from_secs(3600),
            )
            .unwrap();

        // 3.5 × 80 × 1h
        assert!((record.estimated_kcal - 280.0).abs() < 1e-9);
    }

    #[test]
    fn submission_is_staged_in_order() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::granted());
        recorder
            .save_workout(
                500,
                Duration::from_secs(300),
                0.5,
                SystemTime::now() - Duration::from_secs(300),
            )
            .unwrap();

        assert_eq!(
            recorder.store().calls,
            vec![
                "begin_collection",
                "add_sample",
                "add_sample",
                "add_sample",
                "finish_collection",
            ]
        );
        let kinds: Vec<_> = recorder.store().samples.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SampleKind::Steps, SampleKind::Distance, SampleKind::Energy]
        );
        assert_eq!(recorder.store().workouts.len(), 1);
    }

    #[test]
    fn denied_permission_saves_nothing() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::denied());
        let err = recorder
            .save_workout(
                1000,
                Duration::from_secs(600),
                1.0,
                SystemTime::now() - Duration::from_secs(600),
            )
            .unwrap_err();

        assert_matches!(err, RecordError::PermissionDenied);
        // not a single staged call reached the store
        assert!(recorder.store().calls.is_empty());
        assert!(recorder.store().samples.is_empty());
        assert!(recorder.store().workouts.is_empty());
    }

    #[test]
    fn unavailable_store_is_reported() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::unavailable());
        let err = recorder
            .save_workout(1, Duration::from_secs(60), 0.1, SystemTime::now())
            .unwrap_err();
        assert_matches!(err, RecordError::HealthDataUnavailable);
        assert!(recorder.store().calls.is_empty());
    }

    #[test]
    fn mid_submission_failure_aborts_the_remainder() {
        // First add_sample fails: begin went through, nothing else may follow.
        let store = MemoryHealthStore::granted().failing_at("add_sample");
        let mut recorder = WorkoutRecorder::new(store);

        let err = recorder
            .save_workout(
                1000,
                Duration::from_secs(600),
                1.0,
                SystemTime::now() - Duration::from_secs(600),
            )
            .unwrap_err();

        assert_matches!(err, RecordError::Submission(StoreError::Rejected(_)));
        assert_eq!(recorder.store().calls, vec!["begin_collection", "add_sample"]);
        assert!(recorder.store().workouts.is_empty());
    }

    #[test]
    fn failure_at_finish_keeps_already_added_samples() {
        // Known gap: samples accepted before the failing step are not
        // rolled back by the recorder.
        let store = MemoryHealthStore::granted().failing_at("finish_collection");
        let mut recorder = WorkoutRecorder::new(store);

        let err = recorder
            .save_workout(
                1000,
                Duration::from_secs(600),
                1.0,
                SystemTime::now() - Duration::from_secs(600),
            )
            .unwrap_err();

        assert_matches!(err, RecordError::Submission(_));
        assert_eq!(recorder.store().samples.len(), 3);
        assert!(recorder.store().workouts.is_empty());
    }

    #[test]
    fn authorization_granted_path() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::granted());
        assert!(!recorder.is_authorized);

        recorder.request_authorization().unwrap();
        assert!(recorder.is_authorized);
        assert!(recorder.authorization_error.is_none());

        // idempotent
        recorder.request_authorization().unwrap();
        assert!(recorder.is_authorized);
    }

    #[test]
    fn authorization_denied_sets_observable_state_and_errors() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::denied());
        let err = recorder.request_authorization().unwrap_err();

        assert_matches!(err, RecordError::PermissionDenied);
        assert!(!recorder.is_authorized);
        assert_matches!(
            &recorder.authorization_error,
            Some(RecordError::PermissionDenied)
        );
    }

    #[test]
    fn authorization_against_missing_store() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::unavailable());
        let err = recorder.request_authorization().unwrap_err();
        assert_matches!(err, RecordError::HealthDataUnavailable);
        assert!(!recorder.is_authorized);
    }

    #[test]
    fn fetch_user_metrics_swallows_absence() {
        let mut recorder = WorkoutRecorder::new(MemoryHealthStore::granted());
        recorder.fetch_user_metrics();
        assert_eq!(recorder.user_weight_kg, None);
        assert_eq!(recorder.user_height_cm, None);
    }
}
