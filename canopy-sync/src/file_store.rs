//! JSON file remote store.
//!
//! Persists a [`StoreDocument`] at a caller-chosen path. Writes go to
//! `<path>.tmp` and are renamed into place, so a crash never leaves a
//! half-written document. A bare JSON array of configs (the older layout) is
//! still accepted on load.

use std::path::{Path, PathBuf};

use canopy_core::{ProjectConfig, ProjectError, ProjectPath, RemoteStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// On-disk store payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreDocument {
    pub updated_at: DateTime<Utc>,
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreCompat {
    Structured {
        updated_at: Option<DateTime<Utc>>,
        projects: Vec<ProjectConfig>,
    },
    Legacy(Vec<ProjectConfig>),
}

/// Load the document at `path`. A missing file is an empty store.
pub fn load_at(path: &Path) -> Result<StoreDocument, SyncError> {
    if !path.exists() {
        return Ok(StoreDocument {
            updated_at: Utc::now(),
            projects: Vec::new(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(match serde_json::from_str::<StoreCompat>(&contents)? {
        StoreCompat::Structured {
            updated_at,
            projects,
        } => StoreDocument {
            updated_at: updated_at.unwrap_or_else(Utc::now),
            projects,
        },
        StoreCompat::Legacy(projects) => StoreDocument {
            updated_at: Utc::now(),
            projects,
        },
    })
}

/// Save `doc` atomically.
pub fn save_at(path: &Path, doc: &StoreDocument) -> Result<(), SyncError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// [`RemoteStore`] backed by one JSON document.
///
/// Each call is a load-modify-save cycle under an in-process lock.
pub struct FileRemoteStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRemoteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modify(
        &self,
        f: impl FnOnce(&mut Vec<ProjectConfig>) -> Result<(), ProjectError>,
    ) -> Result<(), ProjectError> {
        let _guard = self.lock.lock();
        let mut doc = load_at(&self.path)?;
        f(&mut doc.projects)?;
        doc.projects.sort_by(|a, b| a.path.cmp(&b.path));
        doc.updated_at = Utc::now();
        save_at(&self.path, &doc)?;
        Ok(())
    }
}

impl RemoteStore for FileRemoteStore {
    fn list(&self) -> Result<Vec<ProjectConfig>, ProjectError> {
        let _guard = self.lock.lock();
        Ok(load_at(&self.path)?.projects)
    }

    fn add(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        self.modify(|projects| {
            if projects.iter().any(|c| c.path == config.path) {
                return Err(ProjectError::conflict(format!(
                    "remote store already has a project at {}",
                    config.path
                )));
            }
            projects.push(config.clone());
            Ok(())
        })
    }

    fn update(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        self.modify(|projects| {
            let slot = projects
                .iter_mut()
                .find(|c| c.path == config.path)
                .ok_or_else(|| {
                    ProjectError::not_found(format!("remote store has no project at {}", config.path))
                })?;
            *slot = config.clone();
            Ok(())
        })
    }

    fn remove(&self, path: &ProjectPath) -> Result<(), ProjectError> {
        self.modify(|projects| {
            projects.retain(|c| &c.path != path);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = FileRemoteStore::new(tmp.path().join("remote.json"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remote.json");
        let store = FileRemoteStore::new(&path);
        store.add(&ProjectConfig::new("/api", "rust")).unwrap();
        assert!(path.exists());
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn add_update_remove() {
        let tmp = TempDir::new().unwrap();
        let store = FileRemoteStore::new(tmp.path().join("nested/remote.json"));
        store.add(&ProjectConfig::new("/b", "rust")).unwrap();
        store.add(&ProjectConfig::new("/a", "go")).unwrap();
        assert!(matches!(
            store.add(&ProjectConfig::new("/a", "go")),
            Err(ProjectError::Conflict(_))
        ));

        store
            .update(&ProjectConfig::new("/a", "go").with_attribute("owner", "infra"))
            .unwrap();
        let all = store.list().unwrap();
        assert_eq!(all[0].path.as_str(), "/a");
        assert_eq!(all[0].attributes["owner"].first(), Some("infra"));

        assert!(matches!(
            store.update(&ProjectConfig::new("/zzz", "go")),
            Err(ProjectError::NotFound(_))
        ));

        store.remove(&"/a".into()).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn load_legacy_array_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remote.json");
        std::fs::write(&path, r#"[{"path": "/legacy", "type": "blank"}]"#).unwrap();

        let before = Utc::now();
        let doc = load_at(&path).unwrap();
        assert_eq!(doc.projects[0].path.as_str(), "/legacy");
        assert!(doc.updated_at >= before);
    }

    #[test]
    fn corrupt_document_is_server_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remote.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = FileRemoteStore::new(&path).list().unwrap_err();
        assert!(matches!(err, ProjectError::Server { .. }));
    }
}
