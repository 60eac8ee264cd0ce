//! Lifecycle hooks and importers, registered once at startup and looked up by id.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ProjectError;
use crate::path::ProjectPath;
use crate::types::{Attributes, SourceStorage};
use crate::vfs::{FolderEntry, Vfs};

/// Materialises the folder of a freshly created project of one type.
pub trait CreateProjectHandler: Send + Sync {
    fn project_type(&self) -> &str;

    /// Called with the watcher suspended. Must leave a folder at `path`.
    fn on_create_project(
        &self,
        vfs: &Vfs,
        path: &ProjectPath,
        attributes: &Attributes,
        options: &BTreeMap<String, String>,
    ) -> Result<(), ProjectError>;
}

/// Post-registration hook for one type.
pub trait ProjectInitHandler: Send + Sync {
    fn project_type(&self) -> &str;

    fn on_project_initialized(&self, folder: &FolderEntry) -> Result<(), ProjectError>;
}

/// Receives importer progress, one line at a time.
pub trait LineConsumer: Send {
    fn write_line(&mut self, line: &str);
}

/// Hands out a fresh [`LineConsumer`] per imported project.
pub trait LineConsumerFactory: Send + Sync {
    fn new_consumer(&self, path: &ProjectPath) -> Box<dyn LineConsumer>;
}

/// Discards all output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl LineConsumer for NullOutput {
    fn write_line(&mut self, _line: &str) {}
}

impl LineConsumerFactory for NullOutput {
    fn new_consumer(&self, _path: &ProjectPath) -> Box<dyn LineConsumer> {
        Box::new(NullOutput)
    }
}

/// Collects lines in memory.
impl LineConsumer for Vec<String> {
    fn write_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Fills a target folder from an external source.
pub trait ProjectImporter: Send + Sync {
    /// Source type this importer handles, e.g. `folder` or `git`.
    fn source_type(&self) -> &str;

    fn import_sources(
        &self,
        target: &FolderEntry,
        source: &SourceStorage,
        output: &mut dyn LineConsumer,
    ) -> Result<(), ProjectError>;
}

#[derive(Default)]
pub struct HandlerRegistry {
    create: BTreeMap<String, Arc<dyn CreateProjectHandler>>,
    init: BTreeMap<String, Arc<dyn ProjectInitHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_create(&mut self, handler: Arc<dyn CreateProjectHandler>) {
        self.create.insert(handler.project_type().to_string(), handler);
    }

    pub fn register_init(&mut self, handler: Arc<dyn ProjectInitHandler>) {
        self.init.insert(handler.project_type().to_string(), handler);
    }

    pub fn create_handler_for(&self, type_id: &str) -> Option<Arc<dyn CreateProjectHandler>> {
        self.create.get(type_id).cloned()
    }

    pub fn init_handler_for(&self, type_id: &str) -> Option<Arc<dyn ProjectInitHandler>> {
        self.init.get(type_id).cloned()
    }
}

#[derive(Default)]
pub struct ImporterRegistry {
    importers: BTreeMap<String, Arc<dyn ProjectImporter>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, importer: Arc<dyn ProjectImporter>) {
        self.importers
            .insert(importer.source_type().to_string(), importer);
    }

    pub fn importer_for(&self, source_type: &str) -> Result<Arc<dyn ProjectImporter>, ProjectError> {
        self.importers.get(source_type).cloned().ok_or_else(|| {
            ProjectError::not_found(format!("no importer registered for source type '{source_type}'"))
        })
    }

    pub fn source_types(&self) -> Vec<String> {
        self.importers.keys().cloned().collect()
    }
}
