//! Concurrent in-memory registry of resolved projects.
//!
//! # Consistency model
//!
//! The map supports concurrent reads and independent-key writes. There are
//! no cross-key transactions: subtree removal and re-registration are
//! sequences of single-key writes. Records are replaced wholesale, never
//! edited in place.
//!
//! Reads fail with [`ProjectError::Server`] until [`ProjectRegistry::init_projects`]
//! has completed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::catalog::{TypeCatalog, BASE_TYPE_ID};
use crate::error::ProjectError;
use crate::handlers::HandlerRegistry;
use crate::path::ProjectPath;
use crate::record::{ProjectRecord, Resolution};
use crate::remote::RemoteStore;
use crate::types::ProjectConfig;
use crate::vfs::{FolderEntry, Vfs};

const TYPE_LOCK_STRIPES: usize = 16;
const EVENT_CAPACITY: usize = 256;

/// Registry change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    Registered(ProjectPath),
    Deleted(ProjectPath),
}

pub struct ProjectRegistry {
    projects: DashMap<ProjectPath, Arc<ProjectRecord>>,
    initialized: AtomicBool,
    vfs: Arc<Vfs>,
    catalog: Arc<TypeCatalog>,
    handlers: Arc<HandlerRegistry>,
    events: broadcast::Sender<ProjectEvent>,
    type_locks: Vec<Mutex<()>>,
}

impl ProjectRegistry {
    pub fn new(vfs: Arc<Vfs>, catalog: Arc<TypeCatalog>, handlers: Arc<HandlerRegistry>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            projects: DashMap::new(),
            initialized: AtomicBool::new(false),
            vfs,
            catalog,
            handlers,
            events,
            type_locks: (0..TYPE_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn vfs(&self) -> &Arc<Vfs> {
        &self.vfs
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Load every remote config, then discover untracked top-level folders.
    ///
    /// Records that cannot satisfy their required attributes are repaired
    /// rather than aborting startup. Init handlers run last; their failures
    /// are logged.
    pub fn init_projects(&self, remote: &dyn RemoteStore) -> Result<(), ProjectError> {
        let configs = remote.list()?;
        tracing::info!(count = configs.len(), "loading project configs from remote store");

        for config in configs {
            let folder = self.vfs.folder(&config.path);
            let record = ProjectRecord::build(
                &self.catalog,
                folder,
                Some(config),
                false,
                false,
                Resolution::Repair,
            );
            match record {
                Ok(record) => {
                    self.insert(record);
                }
                Err(e) => tracing::error!(error = %e, "skipping project that failed to resolve"),
            }
        }

        for folder in self.vfs.child_folders(&ProjectPath::root())? {
            if self.projects.contains_key(folder.path()) {
                continue;
            }
            tracing::debug!(path = %folder.path(), "discovered untracked folder");
            match ProjectRecord::build(&self.catalog, Some(folder), None, false, true, Resolution::Repair) {
                Ok(record) => {
                    self.insert(record);
                }
                Err(e) => tracing::error!(error = %e, "skipping detected folder"),
            }
        }

        self.initialized.store(true, Ordering::Release);

        for record in self.snapshot() {
            if let Err(e) = self.fire_init_handlers(&record) {
                tracing::warn!(path = %record.path(), error = %e, "project init handler failed");
            }
        }
        tracing::info!(count = self.projects.len(), "project registry initialized");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn ensure_initialized(&self) -> Result<(), ProjectError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ProjectError::server("the project registry is not initialized yet"))
        }
    }

    fn snapshot(&self) -> Vec<Arc<ProjectRecord>> {
        let mut all: Vec<_> = self.projects.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all
    }

    pub fn get_project(&self, path: &ProjectPath) -> Result<Option<Arc<ProjectRecord>>, ProjectError> {
        self.ensure_initialized()?;
        Ok(self.projects.get(path).map(|e| e.value().clone()))
    }

    /// All records, sorted by path.
    pub fn get_projects(&self) -> Result<Vec<Arc<ProjectRecord>>, ProjectError> {
        self.ensure_initialized()?;
        Ok(self.snapshot())
    }

    /// Records strictly below `path`, sorted by path.
    pub fn get_projects_under(&self, path: &ProjectPath) -> Result<Vec<Arc<ProjectRecord>>, ProjectError> {
        self.ensure_initialized()?;
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|r| r.path().is_descendant_of(path))
            .collect())
    }

    pub fn project_paths(&self) -> Result<Vec<ProjectPath>, ProjectError> {
        self.ensure_initialized()?;
        let mut paths: Vec<_> = self.projects.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        Ok(paths)
    }

    /// Nearest registered record at `path` or above it.
    pub fn get_parent_project(&self, path: &ProjectPath) -> Result<Option<Arc<ProjectRecord>>, ProjectError> {
        self.ensure_initialized()?;
        Ok(path
            .ancestors()
            .into_iter()
            .find_map(|p| self.projects.get(&p).map(|e| e.value().clone())))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    fn insert(&self, record: ProjectRecord) -> Arc<ProjectRecord> {
        let path = record.path().clone();
        let record = Arc::new(record);
        self.projects.insert(path.clone(), record.clone());
        let _ = self.events.send(ProjectEvent::Registered(path));
        record
    }

    /// Build a record and store it under its path, replacing any previous entry.
    ///
    /// Detected records are built leniently; everything else fails on
    /// unresolved required attributes and leaves the registry untouched.
    pub fn put_project(
        &self,
        config: Option<ProjectConfig>,
        folder: Option<FolderEntry>,
        updated: bool,
        detected: bool,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let resolution = if detected {
            Resolution::Repair
        } else {
            Resolution::Strict
        };
        let record = ProjectRecord::build(&self.catalog, folder, config, updated, detected, resolution)?;
        tracing::debug!(path = %record.path(), project_type = record.project_type(), "registered project");
        Ok(self.insert(record))
    }

    /// Store an already-built record as is.
    pub fn put_record(&self, record: ProjectRecord) -> Arc<ProjectRecord> {
        self.insert(record)
    }

    /// Remove `path` and every record below it. Returns the removed records.
    pub fn remove_projects(&self, path: &ProjectPath) -> Vec<Arc<ProjectRecord>> {
        let doomed: Vec<ProjectPath> = self
            .projects
            .iter()
            .filter(|e| e.key().starts_with(path))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for key in doomed {
            if let Some((key, record)) = self.projects.remove(&key) {
                tracing::debug!(path = %key, "deregistered project");
                let _ = self.events.send(ProjectEvent::Deleted(key));
                removed.push(record);
            }
        }
        removed
    }

    /// Remove exactly `path`, leaving nested records in place.
    pub fn remove_project(&self, path: &ProjectPath) -> Option<Arc<ProjectRecord>> {
        let (key, record) = self.projects.remove(path)?;
        tracing::debug!(path = %key, "deregistered project");
        let _ = self.events.send(ProjectEvent::Deleted(key));
        Some(record)
    }

    /// Replace `pushed` with a copy flagged as synced.
    ///
    /// Does nothing when the entry was replaced after `pushed` was read: the
    /// newer record stays unsynced and goes out on the next push. Returns the
    /// entry now stored under the path.
    pub fn mark_synced(&self, pushed: &Arc<ProjectRecord>) -> Option<Arc<ProjectRecord>> {
        let mut entry = self.projects.get_mut(pushed.path())?;
        if Arc::ptr_eq(entry.value(), pushed) {
            *entry.value_mut() = Arc::new(pushed.as_synced());
        } else {
            tracing::debug!(path = %pushed.path(), "record changed during push; leaving it unsynced");
        }
        Some(entry.value().clone())
    }

    fn type_lock(&self, path: &ProjectPath) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        &self.type_locks[hasher.finish() as usize % TYPE_LOCK_STRIPES]
    }

    fn current(&self, path: &ProjectPath) -> Result<Arc<ProjectRecord>, ProjectError> {
        self.get_project(path)?
            .ok_or_else(|| ProjectError::not_found(format!("project {path} is not registered")))
    }

    /// Make `type_id` the primary type, or add it as a mixin.
    pub fn set_project_type(
        &self,
        path: &ProjectPath,
        type_id: &str,
        as_mixin: bool,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let _lock = self.type_lock(path).lock();
        let record = self.current(path)?;
        self.catalog.get(type_id)?;

        let mut config = record.to_config();
        if as_mixin {
            if !config.mixins.iter().any(|m| m == type_id) {
                config.mixins.push(type_id.to_string());
            }
        } else {
            config.project_type = Some(type_id.to_string());
            config.mixins.retain(|m| m != type_id);
        }
        self.put_project(Some(config), record.folder().cloned(), true, false)
    }

    /// Drop `type_id` from the mixins, or reset the primary type to Base.
    pub fn remove_project_type(&self, path: &ProjectPath, type_id: &str) -> Result<Arc<ProjectRecord>, ProjectError> {
        let _lock = self.type_lock(path).lock();
        let record = self.current(path)?;

        let mut config = record.to_config();
        if config.mixins.iter().any(|m| m == type_id) {
            config.mixins.retain(|m| m != type_id);
        } else if config.project_type.as_deref() == Some(type_id) {
            config.project_type = Some(BASE_TYPE_ID.to_string());
        } else {
            return Err(ProjectError::not_found(format!(
                "project {path} does not have type '{type_id}'"
            )));
        }
        self.put_project(Some(config), record.folder().cloned(), true, false)
    }

    /// Run the init handler of every type the record resolved to.
    pub fn fire_init_handlers(&self, record: &ProjectRecord) -> Result<(), ProjectError> {
        let Some(folder) = record.folder() else {
            return Ok(());
        };
        for def in record.types().all() {
            if let Some(handler) = self.handlers.init_handler_for(&def.id) {
                handler.on_project_initialized(folder)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
