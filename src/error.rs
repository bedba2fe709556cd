use thiserror::Error;

/// Failures reported by a step source.
///
/// These arrive asynchronously with no caller to receive them, so they are
/// never returned from tracker operations; the tracker records them in its
/// observable state and force-stops the session instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("step sensor is not available on this device")]
    Unavailable,

    #[error("step sensor failed: {0}")]
    Failed(String),
}

/// Failures from the underlying health store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no sample collection in progress")]
    NoCollection,

    #[error("a sample collection is already in progress")]
    CollectionOpen,

    #[error("store rejected the submission: {0}")]
    Rejected(String),

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

/// Failures on the workout save path, surfaced synchronously to the caller.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("health data is not available")]
    HealthDataUnavailable,

    #[error("permission to write workout data was denied")]
    PermissionDenied,

    #[error("workout submission failed: {0}")]
    Submission(#[from] StoreError),
}
