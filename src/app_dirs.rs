use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("trod"),
            )
        } else {
            ProjectDirs::from("", "", "trod")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("health.db"))
    }

    /// Where the active session's start time survives process suspension
    pub fn resume_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("session_start.json"))
    }
}
