//! Workspace runtime: project manager, file watcher, background indexing.

pub mod config;
mod error;
pub mod importers;
pub mod index_pool;
pub mod indexer;
pub mod manager;
pub mod paths;
mod runtime;
pub mod watcher;
pub mod workspace;

pub use config::{RemoteSettings, Settings};
pub use error::AgentError;
pub use importers::{FolderImporter, FOLDER_SOURCE};
pub use index_pool::IndexPool;
pub use indexer::MemoryIndexer;
pub use manager::ProjectManager;
pub use runtime::{apply_change, init_tracing, run, start_blocking, FsChange};
pub use watcher::SuspendSwitch;
pub use workspace::Workspace;
