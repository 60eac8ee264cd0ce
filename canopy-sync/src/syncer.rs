//! One-way reconciliation of the local registry into the remote store.
//!
//! The registry is the source of truth. Remote entries with no local record
//! are removed; local records that changed since the last push are added or
//! updated. Detected records never leave the machine.

use std::collections::BTreeSet;
use std::sync::Arc;

use canopy_core::{ProjectError, ProjectPath, ProjectRegistry, RemoteStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "path", rename_all = "lowercase")]
pub enum SyncAction {
    Added(ProjectPath),
    Updated(ProjectPath),
    Removed(ProjectPath),
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub finished_at: DateTime<Utc>,
    pub actions: Vec<SyncAction>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

pub struct RemoteSyncer {
    store: Arc<dyn RemoteStore>,
}

impl RemoteSyncer {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Push local state to the remote store.
    ///
    /// Stops at the first remote failure. Records already pushed stay marked
    /// synced; the rest are retried on the next call.
    pub fn sync(&self, registry: &ProjectRegistry) -> Result<SyncReport, ProjectError> {
        let remote = self.store.list()?;
        let local = registry.get_projects()?;
        let mut actions = Vec::new();

        let local_paths: BTreeSet<&ProjectPath> = local.iter().map(|r| r.path()).collect();
        let remote_paths: BTreeSet<ProjectPath> = remote.iter().map(|c| c.path.clone()).collect();

        for config in &remote {
            if !local_paths.contains(&config.path) {
                self.store.remove(&config.path)?;
                actions.push(SyncAction::Removed(config.path.clone()));
            }
        }

        for record in local.iter().filter(|r| !r.is_synced() && !r.is_detected()) {
            let config = record.to_config();
            if remote_paths.contains(record.path()) {
                self.store.update(&config)?;
                actions.push(SyncAction::Updated(record.path().clone()));
            } else {
                self.store.add(&config)?;
                actions.push(SyncAction::Added(record.path().clone()));
            }
            registry.mark_synced(record);
        }

        if !actions.is_empty() {
            tracing::info!(changes = actions.len(), "synchronized projects with remote store");
        }
        Ok(SyncReport {
            finished_at: Utc::now(),
            actions,
        })
    }
}
