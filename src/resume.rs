use crate::app_dirs::AppDirs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// One key-value slot: the active session's start time.
///
/// Written when tracking starts and again when the host goes to the
/// background, read when it returns to the foreground, cleared on stop.
pub trait StartTimeStore {
    fn load(&self) -> Option<SystemTime>;
    fn save(&self, started_at: SystemTime) -> std::io::Result<()>;
    fn clear(&self) -> std::io::Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ResumeRecord {
    started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FileStartTimeStore {
    path: PathBuf,
}

impl FileStartTimeStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::resume_path().unwrap_or_else(|| PathBuf::from("trod_session_start.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileStartTimeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StartTimeStore for FileStartTimeStore {
    fn load(&self) -> Option<SystemTime> {
        let bytes = fs::read(&self.path).ok()?;
        let record = serde_json::from_slice::<ResumeRecord>(&bytes).ok()?;
        Some(record.started_at.into())
    }

    fn save(&self, started_at: SystemTime) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let record = ResumeRecord {
            started_at: started_at.into(),
        };
        let data = serde_json::to_vec_pretty(&record).unwrap_or_default();
        fs::write(&self.path, data)
    }

    fn clear(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-memory slot for tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStartTimeStore {
    slot: Arc<Mutex<Option<SystemTime>>>,
}

impl MemoryStartTimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Second handle onto the same slot, so tests can observe writes
    /// made by a tracker that owns the store.
    pub fn handle(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl StartTimeStore for MemoryStartTimeStore {
    fn load(&self) -> Option<SystemTime> {
        *self.slot.lock().unwrap()
    }

    fn save(&self, started_at: SystemTime) -> std::io::Result<()> {
        *self.slot.lock().unwrap() = Some(started_at);
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        *self.slot.lock().unwrap() = None;
        Ok(())
    }
}
