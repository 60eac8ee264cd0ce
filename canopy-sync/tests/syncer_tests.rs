use std::sync::Arc;

use canopy_core::{
    HandlerRegistry, ProjectConfig, ProjectError, ProjectPath, ProjectRegistry, ProjectTypeDef,
    RemoteStore, TypeCatalog, Vfs,
};
use canopy_sync::{FileRemoteStore, RemoteSyncer, SyncAction};
use tempfile::TempDir;

struct Env {
    _dir: TempDir,
    store: Arc<FileRemoteStore>,
    registry: ProjectRegistry,
    syncer: RemoteSyncer,
}

fn env(seed: &[ProjectConfig]) -> Env {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(FileRemoteStore::new(dir.path().join("remote.json")));
    for cfg in seed {
        store.add(cfg).expect("seed");
    }
    let vfs = Arc::new(Vfs::new(dir.path().join("ws")).expect("vfs"));
    let mut catalog = TypeCatalog::new();
    catalog
        .register(
            ProjectTypeDef::new("svc", "Service")
                .variable("svc.owner", false)
                .constant("svc.kind", "service"),
        )
        .expect("register");
    let registry = ProjectRegistry::new(vfs, Arc::new(catalog), Arc::new(HandlerRegistry::new()));
    registry.init_projects(store.as_ref()).expect("init");
    let syncer = RemoteSyncer::new(store.clone());
    Env {
        _dir: dir,
        store,
        registry,
        syncer,
    }
}

#[test]
fn fresh_registry_loaded_from_remote_is_noop() {
    let e = env(&[ProjectConfig::new("/a", "svc")]);
    let report = e.syncer.sync(&e.registry).expect("sync");
    assert!(report.is_noop());
}

#[test]
fn new_local_record_is_added_and_marked_synced() {
    let e = env(&[]);
    e.registry
        .put_project(
            Some(ProjectConfig::new("/api", "svc").with_attribute("svc.owner", "team-a")),
            None,
            true,
            false,
        )
        .unwrap();

    let report = e.syncer.sync(&e.registry).expect("sync");
    assert_eq!(report.actions, vec![SyncAction::Added("/api".into())]);
    assert!(e.registry.get_project(&"/api".into()).unwrap().unwrap().is_synced());

    let remote = e.store.list().unwrap();
    assert_eq!(remote.len(), 1);
    // Constants are derived from the type, only settable values are pushed.
    assert!(remote[0].attributes.contains_key("svc.owner"));
    assert!(!remote[0].attributes.contains_key("svc.kind"));

    assert!(e.syncer.sync(&e.registry).unwrap().is_noop());
}

#[test]
fn changed_record_is_updated_and_orphans_removed() {
    let e = env(&[ProjectConfig::new("/a", "svc"), ProjectConfig::new("/b", "svc")]);
    e.registry.remove_projects(&"/b".into());
    e.registry
        .put_project(
            Some(ProjectConfig::new("/a", "svc").with_attribute("svc.owner", "ops")),
            None,
            true,
            false,
        )
        .unwrap();

    let report = e.syncer.sync(&e.registry).expect("sync");
    assert_eq!(
        report.actions,
        vec![
            SyncAction::Removed("/b".into()),
            SyncAction::Updated("/a".into()),
        ]
    );
    let remote = e.store.list().unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].attributes["svc.owner"].first(), Some("ops"));
}

#[test]
fn detected_records_never_reach_the_remote() {
    let e = env(&[]);
    let folder = e.registry.vfs().create_folder(&"/scratch".into()).unwrap();
    e.registry.put_project(None, Some(folder), true, true).unwrap();

    let report = e.syncer.sync(&e.registry).expect("sync");
    assert!(report.is_noop());
    assert!(e.store.list().unwrap().is_empty());
}

struct Unreachable;

impl RemoteStore for Unreachable {
    fn list(&self) -> Result<Vec<ProjectConfig>, ProjectError> {
        Err(ProjectError::server("connection refused"))
    }
    fn add(&self, _config: &ProjectConfig) -> Result<(), ProjectError> {
        unreachable!()
    }
    fn update(&self, _config: &ProjectConfig) -> Result<(), ProjectError> {
        unreachable!()
    }
    fn remove(&self, _path: &ProjectPath) -> Result<(), ProjectError> {
        unreachable!()
    }
}

#[test]
fn remote_failure_leaves_record_unsynced() {
    let e = env(&[]);
    e.registry
        .put_project(Some(ProjectConfig::new("/api", "svc")), None, true, false)
        .unwrap();
    let broken = RemoteSyncer::new(Arc::new(Unreachable));
    assert!(matches!(broken.sync(&e.registry), Err(ProjectError::Server { .. })));
    assert!(!e.registry.get_project(&"/api".into()).unwrap().unwrap().is_synced());
}

/// Replaces the record once, while its first push is in flight.
struct EditDuringAdd {
    inner: Arc<FileRemoteStore>,
    registry: std::sync::OnceLock<Arc<ProjectRegistry>>,
    edited: std::sync::atomic::AtomicBool,
}

impl RemoteStore for EditDuringAdd {
    fn list(&self) -> Result<Vec<ProjectConfig>, ProjectError> {
        self.inner.list()
    }
    fn add(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        self.inner.add(config)?;
        if !self.edited.swap(true, std::sync::atomic::Ordering::SeqCst) {
            let registry = self.registry.get().expect("registry wired");
            let newer = ProjectConfig::new(config.path.clone(), "svc").with_attribute("svc.owner", "new");
            registry.put_project(Some(newer), None, true, false)?;
        }
        Ok(())
    }
    fn update(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        self.inner.update(config)
    }
    fn remove(&self, path: &ProjectPath) -> Result<(), ProjectError> {
        self.inner.remove(path)
    }
}

#[test]
fn record_replaced_during_push_is_pushed_again() {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(EditDuringAdd {
        inner: Arc::new(FileRemoteStore::new(dir.path().join("remote.json"))),
        registry: std::sync::OnceLock::new(),
        edited: std::sync::atomic::AtomicBool::new(false),
    });
    let vfs = Arc::new(Vfs::new(dir.path().join("ws")).expect("vfs"));
    let mut catalog = TypeCatalog::new();
    catalog
        .register(ProjectTypeDef::new("svc", "Service").variable("svc.owner", false))
        .expect("register");
    let registry = Arc::new(ProjectRegistry::new(
        vfs,
        Arc::new(catalog),
        Arc::new(HandlerRegistry::new()),
    ));
    registry.init_projects(store.as_ref()).expect("init");
    let _ = store.registry.set(registry.clone());
    let syncer = RemoteSyncer::new(store.clone());

    registry
        .put_project(
            Some(ProjectConfig::new("/api", "svc").with_attribute("svc.owner", "old")),
            None,
            true,
            false,
        )
        .unwrap();

    syncer.sync(&registry).expect("first sync");
    let current = registry.get_project(&"/api".into()).unwrap().unwrap();
    assert_eq!(current.attribute("svc.owner").unwrap().first(), Some("new"));
    assert!(!current.is_synced());

    let report = syncer.sync(&registry).expect("second sync");
    assert_eq!(report.actions, vec![SyncAction::Updated("/api".into())]);
    let remote = store.list().unwrap();
    assert_eq!(remote[0].attributes["svc.owner"].first(), Some("new"));
    assert!(registry.get_project(&"/api".into()).unwrap().unwrap().is_synced());
}
