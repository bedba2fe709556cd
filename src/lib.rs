// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod health;
pub mod pedometer;
pub mod recorder;
pub mod resume;
pub mod runtime;
pub mod session;
pub mod units;
