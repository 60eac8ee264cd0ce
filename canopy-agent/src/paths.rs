use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "config.yaml";
pub const REMOTE_FILE: &str = "remote.json";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

pub fn canopy_root(home: &Path) -> PathBuf {
    home.join(".canopy")
}

pub fn settings_path(home: &Path) -> PathBuf {
    canopy_root(home).join(SETTINGS_FILE)
}

/// Default location of the file-backed remote store.
pub fn default_remote_path(home: &Path) -> PathBuf {
    canopy_root(home).join(REMOTE_FILE)
}
