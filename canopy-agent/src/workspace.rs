//! Wiring of one workspace: VFS, catalog, registry, remote store, manager.

use std::sync::Arc;

use canopy_core::{HandlerRegistry, ImporterRegistry, ProjectRegistry, TypeCatalog, Vfs};
use canopy_sync::{RemoteSyncer, SyncReport};

use crate::config::Settings;
use crate::error::AgentError;
use crate::importers::FolderImporter;
use crate::index_pool::IndexPool;
use crate::indexer::MemoryIndexer;
use crate::manager::ProjectManager;
use crate::watcher::SuspendSwitch;

pub struct Workspace {
    settings: Settings,
    registry: Arc<ProjectRegistry>,
    manager: ProjectManager,
    watcher: Arc<SuspendSwitch>,
    indexer: Arc<MemoryIndexer>,
    syncer: Arc<RemoteSyncer>,
}

impl Workspace {
    /// Build a workspace from explicit parts. The registry is not loaded yet; call [`Workspace::init`].
    pub fn assemble(
        settings: Settings,
        catalog: TypeCatalog,
        handlers: HandlerRegistry,
        importers: ImporterRegistry,
    ) -> Result<Self, AgentError> {
        let vfs = Arc::new(Vfs::new(settings.workspace_root.clone())?);
        let registry = Arc::new(ProjectRegistry::new(vfs, Arc::new(catalog), Arc::new(handlers)));
        let syncer = Arc::new(RemoteSyncer::new(settings.remote.open()));
        let watcher = Arc::new(SuspendSwitch::new());
        let indexer = Arc::new(MemoryIndexer::new());
        let pool = Arc::new(IndexPool::new(settings.index_workers())?);
        let manager = ProjectManager::new(
            registry.clone(),
            Arc::new(importers),
            syncer.clone(),
            watcher.clone(),
            indexer.clone(),
            pool,
        );
        Ok(Self {
            settings,
            registry,
            manager,
            watcher,
            indexer,
            syncer,
        })
    }

    /// Built-in project types and the `folder` importer.
    pub fn open(settings: Settings) -> Result<Self, AgentError> {
        let catalog = canopy_detector::builtin_catalog()?;
        let mut importers = ImporterRegistry::new();
        importers.register(Arc::new(FolderImporter));
        Self::assemble(settings, catalog, HandlerRegistry::new(), importers)
    }

    /// Load the registry from the remote store and the VFS, then push local state back.
    pub fn init(&self) -> Result<SyncReport, AgentError> {
        self.registry.init_projects(self.syncer.store().as_ref())?;
        Ok(self.syncer.sync(&self.registry)?)
    }

    /// Queue every registered project for indexing.
    pub fn reindex_all(&self) -> Result<usize, AgentError> {
        let records = self.registry.get_projects()?;
        for record in &records {
            self.manager.reindex_project(record);
        }
        Ok(records.len())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ProjectRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &ProjectManager {
        &self.manager
    }

    pub fn watcher(&self) -> &Arc<SuspendSwitch> {
        &self.watcher
    }

    pub fn indexer(&self) -> &Arc<MemoryIndexer> {
        &self.indexer
    }

    pub fn syncer(&self) -> &Arc<RemoteSyncer> {
        &self.syncer
    }
}
