//! Data directory resolution.

use std::path::{Path, PathBuf};

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `HRFLOW_DATA_DIR` environment variable
/// 2. `~/.hrflow`
/// 3. `./.hrflow`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HRFLOW_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".hrflow");
    }

    PathBuf::from(".hrflow")
}

/// SQLite URL for the database inside `data_dir`, created on first open.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("hrflow.db").display())
}
