//! Project lifecycle orchestration.
//!
//! Every public operation that touches the VFS holds a [`WatcherSuspension`]
//! for its whole duration and pushes changes to the remote store before
//! returning. The `do_*` internals assume the caller holds the guard.

use std::collections::BTreeMap;
use std::sync::Arc;

use canopy_core::{
    ComposedTypes, FolderEntry, ImporterRegistry, Indexer, LineConsumerFactory, Problem,
    ProblemKind, ProjectConfig, ProjectError, ProjectPath, ProjectRecord, ProjectRegistry,
    Resolution, SourceEstimation, SourceStorage, Vfs, VfsEntry, WatcherControl,
    WatcherSuspension, BASE_TYPE_ID,
};
use canopy_sync::{RemoteSyncer, SyncReport};

use crate::index_pool::IndexPool;

/// Undo step recorded while a batch runs. Applied in reverse on abort.
#[derive(Debug)]
enum Compensation {
    /// Folder tree created by the batch: deregister everything under it, then delete it.
    DeleteTree(ProjectPath),
    /// Record registered by the batch over a folder that already existed.
    Deregister(ProjectPath),
    /// Record replaced by the batch.
    Restore(Arc<ProjectRecord>),
}

pub struct ProjectManager {
    registry: Arc<ProjectRegistry>,
    importers: Arc<ImporterRegistry>,
    syncer: Arc<RemoteSyncer>,
    watcher: Arc<dyn WatcherControl>,
    indexer: Arc<dyn Indexer>,
    pool: Arc<IndexPool>,
}

impl ProjectManager {
    pub fn new(
        registry: Arc<ProjectRegistry>,
        importers: Arc<ImporterRegistry>,
        syncer: Arc<RemoteSyncer>,
        watcher: Arc<dyn WatcherControl>,
        indexer: Arc<dyn Indexer>,
        pool: Arc<IndexPool>,
    ) -> Self {
        Self {
            registry,
            importers,
            syncer,
            watcher,
            indexer,
            pool,
        }
    }

    pub fn registry(&self) -> &Arc<ProjectRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<IndexPool> {
        &self.pool
    }

    fn vfs(&self) -> &Vfs {
        self.registry.vfs()
    }

    // -----------------------------------------------------------------------
    // Create / update / import
    // -----------------------------------------------------------------------

    /// Create a project folder and register it.
    ///
    /// The folder comes from the type's create handler when one is
    /// registered, otherwise an empty folder is made. Missing parent folders
    /// are created and registered as detected projects.
    pub fn create_project(
        &self,
        config: ProjectConfig,
        options: &BTreeMap<String, String>,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let _suspended = WatcherSuspension::new(self.watcher.as_ref());
        let record = self.do_create(config, options)?;
        let record = self.sync_current(record)?;
        self.registry.fire_init_handlers(&record)?;
        self.reindex_project(&record);
        Ok(record)
    }

    fn do_create(
        &self,
        config: ProjectConfig,
        options: &BTreeMap<String, String>,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let path = config.path.clone();
        if path.is_root() {
            return Err(ProjectError::conflict("project path is required"));
        }
        let type_id = config
            .project_type
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProjectError::conflict(format!("project type is required for {path}")))?;
        if self.registry.get_project(&path)?.is_some() {
            return Err(ProjectError::conflict(format!("project {path} already exists")));
        }
        self.registry.catalog().get(&type_id)?;

        let vfs = self.vfs();
        let created = first_missing(vfs, &path);
        let missing_parents: Vec<ProjectPath> = path
            .ancestors()
            .into_iter()
            .skip(1)
            .filter(|p| !vfs.exists(p))
            .collect();

        let record = match self.materialize(&type_id, config, options) {
            Ok(record) => record,
            Err(err) => {
                if let Some(created) = created {
                    if let Err(cleanup) = vfs.delete(&created) {
                        tracing::warn!(path = %created, error = %cleanup, "failed to remove folder of rejected project");
                    }
                }
                return Err(err);
            }
        };

        for parent in missing_parents.iter().rev() {
            if let Err(err) = self.registry.put_project(None, vfs.folder(parent), false, true) {
                tracing::warn!(path = %parent, error = %err, "failed to register parent folder");
            }
        }
        tracing::info!(path = %path, project_type = %type_id, "created project");
        Ok(record)
    }

    fn materialize(
        &self,
        type_id: &str,
        config: ProjectConfig,
        options: &BTreeMap<String, String>,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let vfs = self.vfs();
        let path = config.path.clone();
        match self.registry.handlers().create_handler_for(type_id) {
            Some(handler) => {
                if let Some(parent) = path.parent().filter(|p| !p.is_root()) {
                    vfs.create_folder(&parent)?;
                }
                handler.on_create_project(vfs, &path, &config.attributes, options)?;
            }
            None => {
                vfs.create_folder(&path)?;
            }
        }
        let folder = vfs.folder(&path).ok_or_else(|| {
            ProjectError::server(format!("create handler for '{type_id}' left no folder at {path}"))
        })?;
        self.registry.put_project(Some(config), Some(folder), true, false)
    }

    /// Replace a project's config.
    ///
    /// A folder that exists but is not yet registered becomes a new project.
    pub fn update_project(&self, config: ProjectConfig) -> Result<Arc<ProjectRecord>, ProjectError> {
        let _suspended = WatcherSuspension::new(self.watcher.as_ref());
        let is_new = self.registry.get_project(&config.path)?.is_none();
        let record = self.do_update(config)?;
        let record = self.sync_current(record)?;
        if is_new {
            self.registry.fire_init_handlers(&record)?;
            self.reindex_project(&record);
        }
        Ok(record)
    }

    fn do_update(&self, config: ProjectConfig) -> Result<Arc<ProjectRecord>, ProjectError> {
        let path = config.path.clone();
        if path.is_root() {
            return Err(ProjectError::conflict("project path is required"));
        }
        let folder = match self.registry.get_project(&path)? {
            Some(existing) => existing.folder().cloned().or_else(|| self.vfs().folder(&path)),
            None => Some(
                self.vfs()
                    .folder(&path)
                    .ok_or_else(|| ProjectError::not_found(format!("project {path} does not exist")))?,
            ),
        };
        if let Some(folder) = &folder {
            self.push_settable_values(&config, folder)?;
        }
        let record = self.registry.put_project(Some(config), folder, true, false)?;
        tracing::info!(path = %path, "updated project");
        Ok(record)
    }

    /// Hand config-supplied values to settable providers before the rebuild reads them back.
    fn push_settable_values(&self, config: &ProjectConfig, folder: &FolderEntry) -> Result<(), ProjectError> {
        let catalog = self.registry.catalog();
        let mut types =
            ComposedTypes::resolve(catalog, &config.path, config.project_type.as_deref(), &config.mixins);
        types.add_transient(catalog, folder);

        for (name, value) in &config.attributes {
            let Some(provider) = types.attributes().get(name).and_then(|d| d.provider()) else {
                continue;
            };
            if !provider.is_settable() {
                continue;
            }
            provider
                .set_values(name, folder, value)
                .map_err(|source| ProjectError::ValueResolution {
                    path: config.path.clone(),
                    attribute: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Fill `path` from `source` and register it.
    ///
    /// An existing registration keeps its types and attributes; otherwise the
    /// project starts out as Base.
    pub fn import_project(
        &self,
        path: &ProjectPath,
        source: SourceStorage,
        rewrite: bool,
        output: &dyn LineConsumerFactory,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let _suspended = WatcherSuspension::new(self.watcher.as_ref());
        let config = match self.registry.get_project(path)? {
            Some(existing) => {
                let mut config = existing.to_config();
                config.source = Some(source);
                config
            }
            None => ProjectConfig::new(path.clone(), BASE_TYPE_ID).with_source(source),
        };
        let record = self.do_import(config, rewrite, output)?;
        let record = self.sync_current(record)?;
        self.registry.fire_init_handlers(&record)?;
        self.reindex_project(&record);
        Ok(record)
    }

    fn do_import(
        &self,
        config: ProjectConfig,
        rewrite: bool,
        output: &dyn LineConsumerFactory,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let path = config.path.clone();
        if path.is_root() {
            return Err(ProjectError::conflict("project path is required"));
        }
        let source = config
            .source
            .clone()
            .ok_or_else(|| ProjectError::conflict(format!("no source to import into {path}")))?;
        let importer = self.importers.importer_for(&source.source_type)?;

        let vfs = self.vfs();
        if vfs.exists(&path) && !rewrite {
            return Err(ProjectError::conflict(format!(
                "{path} already exists; import with rewrite to replace its content"
            )));
        }
        let nested = self.registry.get_projects_under(&path)?;
        let created = first_missing(vfs, &path).unwrap_or_else(|| path.clone());
        let folder = vfs.create_folder(&path)?;

        let mut consumer = output.new_consumer(&path);
        if let Err(err) = importer.import_sources(&folder, &source, consumer.as_mut()) {
            tracing::warn!(path = %path, error = %err, "import failed; removing target folder");
            if let Err(cleanup) = vfs.delete(&created) {
                tracing::warn!(path = %created, error = %cleanup, "failed to remove partially imported folder");
            }
            return Err(err);
        }

        for prior in nested {
            let prior_config = (!prior.is_detected()).then(|| prior.to_config());
            let reregistered = self.registry.put_project(
                prior_config,
                vfs.folder(prior.path()),
                !prior.is_synced(),
                prior.is_detected(),
            );
            if let Err(err) = reregistered {
                tracing::warn!(path = %prior.path(), error = %err, "failed to re-register nested project after import");
            }
        }

        let record = self.registry.put_project(Some(config), Some(folder), true, false)?;
        tracing::info!(path = %path, source_type = %source.source_type, "imported project");
        Ok(record)
    }

    /// Create, import, or update every config, parents first.
    ///
    /// A failure before an item's folder exists rolls the whole batch back.
    /// A failure after the folder exists registers the item with an
    /// [`ProblemKind::UpdateFailed`] problem and the batch continues.
    pub fn create_batch_projects(
        &self,
        mut configs: Vec<ProjectConfig>,
        rewrite: bool,
        output: &dyn LineConsumerFactory,
    ) -> Result<Vec<Arc<ProjectRecord>>, ProjectError> {
        let _suspended = WatcherSuspension::new(self.watcher.as_ref());
        configs.sort_by(|a, b| a.path.cmp(&b.path));

        let vfs = self.vfs();
        let mut compensations: Vec<Compensation> = Vec::new();
        let mut records = Vec::with_capacity(configs.len());

        for config in configs {
            let path = config.path.clone();
            let previous = match self.registry.get_project(&path) {
                Ok(previous) => previous,
                Err(err) => {
                    self.rollback(compensations);
                    return Err(err);
                }
            };
            let created = first_missing(vfs, &path);

            let outcome = if config.source.as_ref().is_some_and(SourceStorage::has_location) {
                self.do_import(config.clone(), rewrite, output)
            } else if created.is_some() {
                self.do_create(config.clone(), &BTreeMap::new())
            } else {
                self.do_update(config.clone())
            };

            let record = match outcome {
                Ok(record) => record,
                Err(err) if !vfs.exists(&path) => {
                    tracing::warn!(path = %path, error = %err, "batch item failed before its folder existed; rolling back");
                    self.rollback(compensations);
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "batch item failed; keeping it with a problem");
                    let repaired = ProjectRecord::build(
                        self.registry.catalog(),
                        vfs.folder(&path),
                        Some(config),
                        true,
                        false,
                        Resolution::Repair,
                    );
                    match repaired {
                        Ok(record) => self
                            .registry
                            .put_record(record.with_problem(Problem::new(ProblemKind::UpdateFailed, err.to_string()))),
                        Err(build_err) => {
                            self.rollback(compensations);
                            return Err(build_err);
                        }
                    }
                }
            };

            compensations.push(match (created, previous) {
                (Some(created), _) => Compensation::DeleteTree(created),
                (None, Some(previous)) => Compensation::Restore(previous),
                (None, None) => Compensation::Deregister(path),
            });
            records.push(record);
        }

        self.syncer.sync(&self.registry)?;
        let records: Vec<_> = records.into_iter().map(|r| self.current(r)).collect();
        for record in &records {
            if let Err(err) = self.registry.fire_init_handlers(record) {
                tracing::warn!(path = %record.path(), error = %err, "project init handler failed");
            }
            self.reindex_project(record);
        }
        tracing::info!(count = records.len(), "batch finished");
        Ok(records)
    }

    fn rollback(&self, compensations: Vec<Compensation>) {
        for step in compensations.into_iter().rev() {
            tracing::debug!(?step, "compensating");
            match step {
                Compensation::DeleteTree(path) => {
                    self.registry.remove_projects(&path);
                    if let Err(err) = self.vfs().delete(&path) {
                        tracing::warn!(path = %path, error = %err, "rollback could not delete folder");
                    }
                }
                Compensation::Deregister(path) => {
                    self.registry.remove_project(&path);
                }
                Compensation::Restore(previous) => {
                    self.registry.put_record(previous.as_ref().clone());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn estimate_project(&self, path: &ProjectPath, type_id: &str) -> Result<SourceEstimation, ProjectError> {
        let def = self.registry.catalog().get(type_id)?;
        let folder = self.folder_at(path)?;
        Ok(def.estimate(&folder))
    }

    /// Every type whose recognizer matches the folder, most specific first.
    pub fn resolve_sources(
        &self,
        path: &ProjectPath,
        transient_only: bool,
    ) -> Result<Vec<SourceEstimation>, ProjectError> {
        let folder = self.folder_at(path)?;
        Ok(self
            .registry
            .catalog()
            .list_in_hierarchy_order()
            .into_iter()
            .filter(|t| t.has_recognizer())
            .filter(|t| !transient_only || !t.persisted)
            .map(|t| t.estimate(&folder))
            .filter(|e| e.matched)
            .collect())
    }

    fn folder_at(&self, path: &ProjectPath) -> Result<FolderEntry, ProjectError> {
        self.vfs()
            .folder(path)
            .ok_or_else(|| ProjectError::not_found(format!("folder {path} not found")))
    }

    // -----------------------------------------------------------------------
    // VFS mutations
    // -----------------------------------------------------------------------

    /// Delete a file or folder and deregister every project at or below it.
    ///
    /// A registered project whose folder is already gone is still deregistered.
    pub fn delete(&self, path: &ProjectPath) -> Result<Vec<Arc<ProjectRecord>>, ProjectError> {
        let _suspended = WatcherSuspension::new(self.watcher.as_ref());
        let registered = self.registry.get_project(path)?.is_some()
            || !self.registry.get_projects_under(path)?.is_empty();
        match self.vfs().delete(path) {
            Ok(()) => {}
            Err(ProjectError::NotFound(_)) if registered => {
                tracing::debug!(path = %path, "folder already gone; deregistering only");
            }
            Err(err) => return Err(err),
        }
        let removed = self.registry.remove_projects(path);
        self.syncer.sync(&self.registry)?;
        tracing::info!(path = %path, projects = removed.len(), "deleted");
        Ok(removed)
    }

    /// Copy `source` into `target_parent`. Projects inside the copy are registered under their new paths.
    pub fn copy_to(
        &self,
        source: &ProjectPath,
        target_parent: &ProjectPath,
        new_name: Option<&str>,
        overwrite: bool,
    ) -> Result<VfsEntry, ProjectError> {
        let _suspended = WatcherSuspension::new(self.watcher.as_ref());
        let carried = self.records_at_or_below(source)?;
        let entry = self.vfs().copy_to(source, target_parent, new_name, overwrite)?;
        let added = self.register_relocated(&carried, source, entry.path())?;
        self.syncer.sync(&self.registry)?;
        for record in &added {
            self.reindex_project(record);
        }
        Ok(entry)
    }

    /// Move `source` into `target_parent`. Projects travel with their folders.
    pub fn move_to(
        &self,
        source: &ProjectPath,
        target_parent: &ProjectPath,
        new_name: Option<&str>,
        overwrite: bool,
    ) -> Result<VfsEntry, ProjectError> {
        let _suspended = WatcherSuspension::new(self.watcher.as_ref());
        let carried = self.records_at_or_below(source)?;
        let entry = self.vfs().move_to(source, target_parent, new_name, overwrite)?;
        self.registry.remove_projects(source);
        let added = self.register_relocated(&carried, source, entry.path())?;
        self.syncer.sync(&self.registry)?;
        for record in &added {
            self.reindex_project(record);
        }
        tracing::info!(from = %source, to = %entry.path(), projects = added.len(), "moved");
        Ok(entry)
    }

    fn records_at_or_below(&self, path: &ProjectPath) -> Result<Vec<Arc<ProjectRecord>>, ProjectError> {
        Ok(self
            .registry
            .get_projects()?
            .into_iter()
            .filter(|r| r.path().starts_with(path))
            .collect())
    }

    fn register_relocated(
        &self,
        records: &[Arc<ProjectRecord>],
        from: &ProjectPath,
        to: &ProjectPath,
    ) -> Result<Vec<Arc<ProjectRecord>>, ProjectError> {
        self.registry.remove_projects(to);
        let mut added = Vec::with_capacity(records.len());
        for record in records {
            let Some(new_path) = record.path().rebase(from, to) else { continue };
            let folder = self.vfs().folder(&new_path);
            let relocated = if record.is_detected() {
                self.registry.put_project(None, folder, false, true)?
            } else {
                let mut config = record.to_config();
                if record.path() == from && config.name == from.name() {
                    config.name = new_path.name().to_string();
                }
                config.path = new_path;
                self.registry.put_project(Some(config), folder, true, false)?
            };
            added.push(relocated);
        }
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    pub fn set_project_type(
        &self,
        path: &ProjectPath,
        type_id: &str,
        as_mixin: bool,
    ) -> Result<Arc<ProjectRecord>, ProjectError> {
        let record = self.registry.set_project_type(path, type_id, as_mixin)?;
        self.sync_current(record)
    }

    pub fn remove_project_type(&self, path: &ProjectPath, type_id: &str) -> Result<Arc<ProjectRecord>, ProjectError> {
        let record = self.registry.remove_project_type(path, type_id)?;
        self.sync_current(record)
    }

    // -----------------------------------------------------------------------
    // Indexing and sync
    // -----------------------------------------------------------------------

    /// Queue the record's folder tree for indexing. Failures are only logged.
    pub fn reindex_project(&self, record: &ProjectRecord) {
        if record.folder().is_none() {
            return;
        }
        let vfs = Arc::clone(self.registry.vfs());
        let indexer = Arc::clone(&self.indexer);
        let path = record.path().clone();
        self.pool.submit(move || {
            let entries = match vfs.walk(&path) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "reindex walk failed");
                    return;
                }
            };
            let mut indexed = 0usize;
            for entry in &entries {
                match indexer.add(entry) {
                    Ok(()) => indexed += 1,
                    Err(err) => tracing::warn!(path = %entry.path(), error = %err, "indexing failed"),
                }
            }
            tracing::debug!(path = %path, entries = indexed, "reindexed project");
        });
    }

    pub fn sync(&self) -> Result<SyncReport, ProjectError> {
        self.syncer.sync(&self.registry)
    }

    /// Push pending records, then return the entry the registry now holds for `record`.
    fn sync_current(&self, record: Arc<ProjectRecord>) -> Result<Arc<ProjectRecord>, ProjectError> {
        self.syncer.sync(&self.registry)?;
        Ok(self.current(record))
    }

    fn current(&self, record: Arc<ProjectRecord>) -> Arc<ProjectRecord> {
        match self.registry.get_project(record.path()) {
            Ok(Some(current)) => current,
            _ => record,
        }
    }
}

/// Shallowest ancestor-or-self of `path` that does not exist yet.
fn first_missing(vfs: &Vfs, path: &ProjectPath) -> Option<ProjectPath> {
    path.ancestors().into_iter().rev().find(|p| !vfs.exists(p))
}
