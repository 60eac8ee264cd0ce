//! Registry behaviour against a real on-disk VFS: startup discovery, subtree
//! removal, failed construction, and type fallback.

use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use canopy_core::{
    HandlerRegistry, ProblemKind, ProjectConfig, ProjectError, ProjectInitHandler, ProjectPath,
    ProjectRegistry, ProjectTypeDef, RemoteStore, TypeCatalog, Vfs, BASE_TYPE_ID,
};
use canopy_core::vfs::FolderEntry;
use predicates::prelude::predicate;
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryRemote(Mutex<Vec<ProjectConfig>>);

impl RemoteStore for MemoryRemote {
    fn list(&self) -> Result<Vec<ProjectConfig>, ProjectError> {
        Ok(self.0.lock().unwrap().clone())
    }
    fn add(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        self.0.lock().unwrap().push(config.clone());
        Ok(())
    }
    fn update(&self, config: &ProjectConfig) -> Result<(), ProjectError> {
        let mut all = self.0.lock().unwrap();
        all.retain(|c| c.path != config.path);
        all.push(config.clone());
        Ok(())
    }
    fn remove(&self, path: &ProjectPath) -> Result<(), ProjectError> {
        self.0.lock().unwrap().retain(|c| &c.path != path);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingInit(Mutex<Vec<String>>);

impl ProjectInitHandler for RecordingInit {
    fn project_type(&self) -> &str {
        "service"
    }
    fn on_project_initialized(&self, folder: &FolderEntry) -> Result<(), ProjectError> {
        self.0.lock().unwrap().push(folder.path().to_string());
        Ok(())
    }
}

fn catalog() -> TypeCatalog {
    let mut c = TypeCatalog::new();
    c.register(ProjectTypeDef::new("service", "Service").variable("service.port", false))
        .expect("register service");
    c.register(ProjectTypeDef::new("strict", "Strict").variable("strict.id", true))
        .expect("register strict");
    c
}

fn open(root: &std::path::Path, handlers: HandlerRegistry) -> ProjectRegistry {
    let vfs = Arc::new(Vfs::new(root).expect("vfs"));
    ProjectRegistry::new(vfs, Arc::new(catalog()), Arc::new(handlers))
}

fn initialized(root: &std::path::Path) -> ProjectRegistry {
    let reg = open(root, HandlerRegistry::new());
    reg.init_projects(&MemoryRemote::default()).expect("init");
    reg
}

// ---------------------------------------------------------------------------
// 1. Startup scan
// ---------------------------------------------------------------------------

#[test]
fn init_loads_remote_configs_and_discovers_untracked_folders() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("api").create_dir_all().expect("mkdir api");
    root.child("scratch").create_dir_all().expect("mkdir scratch");

    let remote = MemoryRemote::default();
    remote
        .add(&ProjectConfig::new("/api", "service").with_attribute("service.port", "8080"))
        .unwrap();
    remote.add(&ProjectConfig::new("/gone", "service")).unwrap();

    let init = Arc::new(RecordingInit::default());
    let mut handlers = HandlerRegistry::new();
    handlers.register_init(init.clone());
    let reg = open(root.path(), handlers);
    reg.init_projects(&remote).expect("init");

    let api = reg.get_project(&"/api".into()).unwrap().expect("api");
    assert!(!api.is_detected());
    assert!(api.is_synced());
    assert_eq!(api.attribute("service.port").unwrap().first(), Some("8080"));

    let gone = reg.get_project(&"/gone".into()).unwrap().expect("gone");
    assert!(gone.has_problem(ProblemKind::FolderMissing));

    let scratch = reg.get_project(&"/scratch".into()).unwrap().expect("scratch");
    assert!(scratch.is_detected());
    assert_eq!(scratch.project_type(), BASE_TYPE_ID);
    assert!(scratch.has_problem(ProblemKind::ConfigMissing));

    assert_eq!(*init.0.lock().unwrap(), vec!["/api".to_string()]);
}

#[test]
fn init_repairs_remote_config_missing_required_values() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("s").create_dir_all().unwrap();
    let remote = MemoryRemote::default();
    remote.add(&ProjectConfig::new("/s", "strict")).unwrap();

    let reg = open(root.path(), HandlerRegistry::new());
    reg.init_projects(&remote).expect("startup must not abort");
    let rec = reg.get_project(&"/s".into()).unwrap().expect("repaired record");
    assert_eq!(rec.project_type(), BASE_TYPE_ID);
    assert!(rec.has_problem(ProblemKind::TypeUnresolved));
}

// ---------------------------------------------------------------------------
// 2. Path handling
// ---------------------------------------------------------------------------

#[rstest]
#[case("api", "/api")]
#[case("/api/", "/api")]
#[case("//nested//child", "/nested/child")]
#[case("/x/../api", "/api")]
fn stored_path_is_absolutized(#[case] raw: &str, #[case] expected: &str) {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let reg = initialized(root.path());
    let cfg = ProjectConfig {
        path: ProjectPath::new(raw),
        project_type: Some("service".into()),
        ..ProjectConfig::default()
    };
    reg.put_project(Some(cfg), None, true, false).unwrap();
    let rec = reg.get_project(&ProjectPath::new(raw)).unwrap().expect("record");
    assert_eq!(rec.path().as_str(), expected);
}

#[test]
fn remove_projects_is_segment_based() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let reg = initialized(root.path());
    for p in ["/a", "/a/b/c", "/ab", "/b"] {
        reg.put_project(Some(ProjectConfig::new(p, "service")), None, false, false)
            .unwrap();
    }

    let removed = reg.remove_projects(&"/a".into());
    assert_eq!(removed.len(), 2);

    let left: Vec<String> = reg
        .project_paths()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(left, vec!["/ab", "/b"]);
}

#[test]
fn projects_under_excludes_self_and_siblings() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let reg = initialized(root.path());
    for p in ["/a", "/a/x", "/a/y/z", "/ab"] {
        reg.put_project(Some(ProjectConfig::new(p, "service")), None, false, false)
            .unwrap();
    }
    let under: Vec<String> = reg
        .get_projects_under(&"/a".into())
        .unwrap()
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(under, vec!["/a/x", "/a/y/z"]);
}

// ---------------------------------------------------------------------------
// 3. Construction failures and fallbacks
// ---------------------------------------------------------------------------

#[test]
fn constraint_violation_leaves_registry_unchanged() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let reg = initialized(root.path());
    reg.put_project(Some(ProjectConfig::new("/s", "service")), None, false, false)
        .unwrap();

    let err = reg
        .put_project(Some(ProjectConfig::new("/s", "strict")), None, true, false)
        .unwrap_err();
    assert!(matches!(err, ProjectError::Constraint { .. }), "got: {err}");
    assert!(err.to_string().contains("strict.id"));

    let rec = reg.get_project(&"/s".into()).unwrap().expect("old record kept");
    assert_eq!(rec.project_type(), "service");
    assert_eq!(reg.get_projects().unwrap().len(), 1);
}

#[test]
fn unknown_primary_type_still_registers_with_base() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("p").create_dir_all().unwrap();
    let reg = initialized(root.path());
    let folder = reg.vfs().folder(&"/p".into());

    let rec = reg
        .put_project(Some(ProjectConfig::new("/p", "not-a-type")), folder, true, false)
        .unwrap();
    assert_eq!(rec.project_type(), BASE_TYPE_ID);
    let codes: Vec<u16> = rec.problems().iter().map(|p| p.code()).collect();
    assert_eq!(codes, vec![12]);

    root.child("p").assert(predicate::path::is_dir());
}
