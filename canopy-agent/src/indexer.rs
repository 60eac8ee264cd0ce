//! In-memory file-name index.

use std::collections::BTreeSet;

use canopy_core::{Indexer, ProjectError, ProjectPath, VfsEntry};
use dashmap::DashMap;

/// Maps lower-cased file names to the paths that carry them.
#[derive(Debug, Default)]
pub struct MemoryIndexer {
    by_name: DashMap<String, BTreeSet<ProjectPath>>,
}

impl MemoryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&self, name: &str) -> Vec<ProjectPath> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|e| e.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.by_name.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every file at or below `path`.
    pub fn remove_under(&self, path: &ProjectPath) {
        self.by_name.retain(|_, paths| {
            paths.retain(|p| !p.starts_with(path));
            !paths.is_empty()
        });
    }
}

impl Indexer for MemoryIndexer {
    fn add(&self, entry: &VfsEntry) -> Result<(), ProjectError> {
        if let VfsEntry::File(file) = entry {
            self.by_name
                .entry(file.path().name().to_lowercase())
                .or_default()
                .insert(file.path().clone());
        }
        Ok(())
    }
}
