//! Agent settings at `<home>/.canopy/config.yaml`.
//!
//! Every function comes in two forms: `fn_at(home, …)` with an explicit home
//! (used by tests with `TempDir`) and `fn(…)`, which derives home from
//! `dirs::home_dir()` and delegates.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use canopy_core::RemoteStore;
use canopy_sync::{FileRemoteStore, HttpRemoteStore};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, AgentError};
use crate::paths::{canopy_root, settings_path, DEFAULT_DEBOUNCE};

fn default_timeout_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

/// Where persisted project configs live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteSettings {
    File {
        path: PathBuf,
    },
    Http {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl RemoteSettings {
    pub fn open(&self) -> Arc<dyn RemoteStore> {
        match self {
            RemoteSettings::File { path } => Arc::new(FileRemoteStore::new(path)),
            RemoteSettings::Http { url, timeout_secs } => {
                Arc::new(HttpRemoteStore::new(url, Duration::from_secs(*timeout_secs)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Physical directory backing the VFS root.
    pub workspace_root: PathBuf,
    pub remote: RemoteSettings,
    /// Reindex pool size. Defaults to available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_workers: Option<usize>,
    #[serde(default = "default_debounce_ms")]
    pub watch_debounce_ms: u64,
}

impl Settings {
    pub fn new(workspace_root: impl Into<PathBuf>, remote: RemoteSettings) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            remote,
            index_workers: None,
            watch_debounce_ms: default_debounce_ms(),
        }
    }

    pub fn index_workers(&self) -> usize {
        self.index_workers
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

pub fn load_at(home: &Path) -> Result<Settings, AgentError> {
    let path = settings_path(home);
    if !path.exists() {
        return Err(AgentError::SettingsNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| AgentError::Settings { path, source })
}

pub fn load() -> Result<Settings, AgentError> {
    load_at(&home()?)
}

/// Write settings atomically (tmp + rename, mode `0600`).
pub fn save_at(home: &Path, settings: &Settings) -> Result<PathBuf, AgentError> {
    let dir = canopy_root(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let path = settings_path(home);
    let tmp = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(settings).map_err(|source| AgentError::Settings {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

pub fn save(settings: &Settings) -> Result<PathBuf, AgentError> {
    save_at(&home()?, settings)
}

pub fn home() -> Result<PathBuf, AgentError> {
    dirs::home_dir().ok_or(AgentError::NoHome)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), AgentError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), AgentError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_settings_names_expected_path() {
        let home = TempDir::new().unwrap();
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, AgentError::SettingsNotFound { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn save_then_load() {
        let home = TempDir::new().unwrap();
        let settings = Settings::new(
            home.path().join("ws"),
            RemoteSettings::Http {
                url: "http://master:8080/api".into(),
                timeout_secs: 5,
            },
        );
        let path = save_at(home.path(), &settings).unwrap();
        assert!(!path.with_extension("yaml.tmp").exists());
        assert_eq!(load_at(home.path()).unwrap(), settings);
    }

    #[cfg(unix)]
    #[test]
    fn settings_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let home = TempDir::new().unwrap();
        let settings = Settings::new(
            home.path().join("ws"),
            RemoteSettings::File {
                path: home.path().join("remote.json"),
            },
        );
        let path = save_at(home.path(), &settings).unwrap();
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let yaml = "workspace_root: /srv/ws\nremote:\n  kind: http\n  url: http://m\n";
        let s: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(s.watch_debounce_ms, 500);
        assert!(s.index_workers() >= 1);
        assert_eq!(
            s.remote,
            RemoteSettings::Http {
                url: "http://m".into(),
                timeout_secs: 30
            }
        );
    }
}
