//! Authoritative store of persisted project configs.

use crate::error::ProjectError;
use crate::path::ProjectPath;
use crate::types::ProjectConfig;

/// Implementations block the caller; transport failures surface as
/// [`ProjectError::Server`].
pub trait RemoteStore: Send + Sync {
    fn list(&self) -> Result<Vec<ProjectConfig>, ProjectError>;
    fn add(&self, config: &ProjectConfig) -> Result<(), ProjectError>;
    fn update(&self, config: &ProjectConfig) -> Result<(), ProjectError>;
    fn remove(&self, path: &ProjectPath) -> Result<(), ProjectError>;
}
