use crate::app_dirs::AppDirs;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied,
}

/// Body measurements kept by the store for calorie enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMetric {
    HeightCm,
    WeightKg,
}

impl BodyMetric {
    fn as_str(self) -> &'static str {
        match self {
            BodyMetric::HeightCm => "height_cm",
            BodyMetric::WeightKg => "weight_kg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Steps,
    Distance,
    Energy,
}

impl SampleKind {
    fn as_str(self) -> &'static str {
        match self {
            SampleKind::Steps => "steps",
            SampleKind::Distance => "distance_km",
            SampleKind::Energy => "energy_kcal",
        }
    }
}

/// One quantity spanning the workout interval
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSample {
    pub kind: SampleKind,
    pub value: f64,
    pub start: SystemTime,
    pub end: SystemTime,
}

/// A finished workout as submitted to the store
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub steps: u64,
    pub duration: Duration,
    pub distance_km: f64,
    pub estimated_kcal: f64,
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
}

/// Store of workout records and body metrics.
///
/// Submission is staged: `begin_collection`, one `add_sample` per
/// quantity, then `finish_collection` with the workout metadata. Each step
/// must succeed before the next is issued; the store does not promise to
/// roll back samples accepted before a later step fails.
pub trait HealthStore {
    fn is_available(&self) -> bool;

    fn authorization(&self) -> Authorization;

    fn request_write_permission(&mut self) -> Result<Authorization, StoreError>;

    /// Most recent value for a body metric, if any was ever recorded
    fn latest_sample(&self, metric: BodyMetric) -> Result<Option<f64>, StoreError>;

    fn begin_collection(&mut self, start: SystemTime, end: SystemTime) -> Result<(), StoreError>;

    fn add_sample(&mut self, sample: WorkoutSample) -> Result<(), StoreError>;

    fn finish_collection(&mut self, record: &WorkoutRecord) -> Result<(), StoreError>;
}

fn to_rfc3339(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).to_rfc3339()
}

fn from_rfc3339(s: &str) -> Result<SystemTime, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc).into())
        .map_err(|e| StoreError::Rejected(format!("bad timestamp {s:?}: {e}")))
}

#[derive(Debug)]
struct PendingCollection {
    start: SystemTime,
    end: SystemTime,
    samples: Vec<WorkoutSample>,
}

/// Local health store backed by sqlite
#[derive(Debug)]
pub struct SqliteHealthStore {
    conn: Connection,
    pending: Option<PendingCollection>,
}

impl SqliteHealthStore {
    /// Open (and if needed create) the database under the state directory
    pub fn new() -> Result<Self, StoreError> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("trod_health.db"));
        Self::with_path(db_path)
    }

    pub fn with_path<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Rejected(format!("failed to create state directory: {e}"))
            })?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS workouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                steps INTEGER NOT NULL,
                distance_km REAL NOT NULL,
                energy_kcal REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS workout_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                value REAL NOT NULL,
                start TEXT NOT NULL,
                end TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS body_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                value REAL NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_workouts_started_at ON workouts(started_at)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_workout_samples_workout ON workout_samples(workout_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_body_metrics_kind ON body_metrics(kind)",
            [],
        )?;

        Ok(SqliteHealthStore {
            conn,
            pending: None,
        })
    }

    pub fn record_body_metric(&self, metric: BodyMetric, value: f64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO body_metrics (kind, value, recorded_at) VALUES (?1, ?2, ?3)",
            params![metric.as_str(), value, to_rfc3339(SystemTime::now())],
        )?;
        Ok(())
    }

    /// Most recent workouts, newest first
    pub fn recent_workouts(&self, limit: usize) -> Result<Vec<WorkoutRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT started_at, ended_at, duration_secs, steps, distance_km, energy_kcal
            FROM workouts
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })?;

        let mut workouts = Vec::new();
        for row in rows {
            let (started_at, ended_at, duration_secs, steps, distance_km, energy_kcal) = row?;
            workouts.push(WorkoutRecord {
                steps: steps.max(0) as u64,
                duration: Duration::from_secs_f64(duration_secs.max(0.0)),
                distance_km,
                estimated_kcal: energy_kcal,
                started_at: from_rfc3339(&started_at)?,
                ended_at: from_rfc3339(&ended_at)?,
            });
        }
        Ok(workouts)
    }

    /// Dump the whole workout log as CSV
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT started_at, ended_at, duration_secs, steps, distance_km, energy_kcal
            FROM workouts
            ORDER BY started_at ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })?;

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "started_at",
            "ended_at",
            "duration_secs",
            "steps",
            "distance_km",
            "energy_kcal",
        ])?;

        let mut written = 0;
        for row in rows {
            let (started_at, ended_at, duration_secs, steps, distance_km, energy_kcal) = row?;
            writer.write_record([
                started_at,
                ended_at,
                format!("{duration_secs:.1}"),
                steps.to_string(),
                format!("{distance_km:.3}"),
                format!("{energy_kcal:.1}"),
            ])?;
            written += 1;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(written)
    }
}

impl HealthStore for SqliteHealthStore {
    fn is_available(&self) -> bool {
        true
    }

    fn authorization(&self) -> Authorization {
        // local store, nothing to grant
        Authorization::Granted
    }

    fn request_write_permission(&mut self) -> Result<Authorization, StoreError> {
        Ok(Authorization::Granted)
    }

    fn latest_sample(&self, metric: BodyMetric) -> Result<Option<f64>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM body_metrics WHERE kind = ?1 ORDER BY recorded_at DESC, id DESC LIMIT 1",
                params![metric.as_str()],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn begin_collection(&mut self, start: SystemTime, end: SystemTime) -> Result<(), StoreError> {
        if self.pending.is_some() {
            return Err(StoreError::CollectionOpen);
        }
        self.pending = Some(PendingCollection {
            start,
            end,
            samples: Vec::new(),
        });
        Ok(())
    }

    fn add_sample(&mut self, sample: WorkoutSample) -> Result<(), StoreError> {
        let pending = self.pending.as_mut().ok_or(StoreError::NoCollection)?;
        pending.samples.push(sample);
        Ok(())
    }

    fn finish_collection(&mut self, record: &WorkoutRecord) -> Result<(), StoreError> {
        let pending = self.pending.take().ok_or(StoreError::NoCollection)?;
        if pending.start != record.started_at || pending.end != record.ended_at {
            return Err(StoreError::Rejected(
                "workout interval does not match the open collection".into(),
            ));
        }

        // whole collection lands in one transaction
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO workouts
            (started_at, ended_at, duration_secs, steps, distance_km, energy_kcal)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                to_rfc3339(record.started_at),
                to_rfc3339(record.ended_at),
                record.duration.as_secs_f64(),
                record.steps as i64,
                record.distance_km,
                record.estimated_kcal,
            ],
        )?;
        let workout_id = tx.last_insert_rowid();

        for sample in &pending.samples {
            tx.execute(
                r#"
                INSERT INTO workout_samples (workout_id, kind, value, start, end)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    workout_id,
                    sample.kind.as_str(),
                    sample.value,
                    to_rfc3339(sample.start),
                    to_rfc3339(sample.end),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// In-memory store with a call journal, for exercising the save path
#[derive(Default)]
pub struct MemoryHealthStore {
    available: bool,
    auth: Option<Authorization>,
    fail_on: Option<&'static str>,
    pub calls: Vec<&'static str>,
    pending: Option<(SystemTime, SystemTime)>,
    pub samples: Vec<WorkoutSample>,
    pub workouts: Vec<WorkoutRecord>,
    pub metrics: Vec<(BodyMetric, f64)>,
}

impl MemoryHealthStore {
    pub fn granted() -> Self {
        Self {
            available: true,
            auth: Some(Authorization::Granted),
            ..Self::default()
        }
    }

    pub fn denied() -> Self {
        Self {
            available: true,
            auth: Some(Authorization::Denied),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            auth: None,
            ..Self::default()
        }
    }

    pub fn with_metric(mut self, metric: BodyMetric, value: f64) -> Self {
        self.metrics.push((metric, value));
        self
    }

    /// The named call records itself in the journal, then fails
    pub fn failing_at(mut self, step: &'static str) -> Self {
        self.fail_on = Some(step);
        self
    }

    fn step(&mut self, name: &'static str) -> Result<(), StoreError> {
        self.calls.push(name);
        if self.fail_on == Some(name) {
            return Err(StoreError::Rejected(format!("injected failure at {name}")));
        }
        Ok(())
    }
}

impl HealthStore for MemoryHealthStore {
    fn is_available(&self) -> bool {
        self.available
    }

    fn authorization(&self) -> Authorization {
        self.auth.unwrap_or(Authorization::Denied)
    }

    fn request_write_permission(&mut self) -> Result<Authorization, StoreError> {
        self.step("request_write_permission")?;
        Ok(self.authorization())
    }

    fn latest_sample(&self, metric: BodyMetric) -> Result<Option<f64>, StoreError> {
        Ok(self
            .metrics
            .iter()
            .rev()
            .find(|(kind, _)| *kind == metric)
            .map(|(_, value)| *value))
    }

    fn begin_collection(&mut self, start: SystemTime, end: SystemTime) -> Result<(), StoreError> {
        self.step("begin_collection")?;
        if self.pending.is_some() {
            return Err(StoreError::CollectionOpen);
        }
        self.pending = Some((start, end));
        Ok(())
    }

    fn add_sample(&mut self, sample: WorkoutSample) -> Result<(), StoreError> {
        self.step("add_sample")?;
        if self.pending.is_none() {
            return Err(StoreError::NoCollection);
        }
        self.samples.push(sample);
        Ok(())
    }

    fn finish_collection(&mut self, record: &WorkoutRecord) -> Result<(), StoreError> {
        self.step("finish_collection")?;
        if self.pending.take().is_none() {
            return Err(StoreError::NoCollection);
        }
        self.workouts.push(record.clone());
        Ok(())
    }
}
