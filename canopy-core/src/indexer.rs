//! Search indexer seam.

use crate::error::ProjectError;
use crate::vfs::VfsEntry;

/// Best-effort: callers log failures and move on.
pub trait Indexer: Send + Sync {
    fn add(&self, entry: &VfsEntry) -> Result<(), ProjectError>;
}
