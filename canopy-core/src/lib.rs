//! Canopy core library: project types, resolution, and the project registry.
//!
//! - [`path`]: normalised virtual paths
//! - [`types`]: configs, attribute values, problems
//! - [`catalog`] / [`composer`]: type descriptors and their composition
//! - [`record`] / [`registry`]: resolved projects and the concurrent registry
//! - [`vfs`], [`handlers`], [`watch`], [`remote`], [`indexer`]: collaborator seams

pub mod catalog;
pub mod composer;
pub mod error;
pub mod handlers;
pub mod indexer;
pub mod path;
pub mod record;
pub mod registry;
pub mod remote;
pub mod types;
pub mod vfs;
pub mod watch;

pub use catalog::{
    AttributeDef, AttributeKind, ProjectTypeDef, SourceEstimation, SourceRecognizer, TypeCatalog,
    ValueProvider, BASE_TYPE_ID,
};
pub use composer::ComposedTypes;
pub use error::{ProjectError, ValueError};
pub use handlers::{
    CreateProjectHandler, HandlerRegistry, ImporterRegistry, LineConsumer, LineConsumerFactory,
    NullOutput, ProjectImporter, ProjectInitHandler,
};
pub use indexer::Indexer;
pub use path::ProjectPath;
pub use record::{ProjectRecord, RecordSummary, Resolution};
pub use registry::{ProjectEvent, ProjectRegistry};
pub use remote::RemoteStore;
pub use types::{AttributeValue, Attributes, Problem, ProblemKind, ProjectConfig, SourceStorage};
pub use vfs::{FileEntry, FolderEntry, Vfs, VfsEntry};
pub use watch::{NoopWatcher, WatcherControl, WatcherSuspension};
