use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn canopy_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("canopy"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

/// Home dir with settings pointing at `<home>/ws` and a file remote.
fn initialised_home() -> (TempDir, PathBuf) {
    let home = TempDir::new().expect("home");
    let root = home.path().join("ws");
    let remote = home.path().join("remote.json");
    canopy_cmd(home.path())
        .arg("init")
        .arg("--root")
        .arg(&root)
        .arg("--remote-file")
        .arg(&remote)
        .assert()
        .success()
        .stdout(contains("Workspace root"));
    (home, root)
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run canopy");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn list_paths(home: &Path) -> Vec<String> {
    let listed = json_stdout(canopy_cmd(home).args(["list", "--json"]));
    listed
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["path"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn remote_paths(home: &Path) -> Vec<String> {
    let raw = fs::read_to_string(home.join("remote.json")).expect("remote exists");
    let doc: Value = serde_json::from_str(&raw).expect("remote is JSON");
    let mut paths: Vec<String> = doc["projects"]
        .as_array()
        .expect("projects array")
        .iter()
        .map(|p| p["path"].as_str().unwrap_or_default().to_string())
        .collect();
    paths.sort();
    paths
}

#[test]
fn commands_need_settings_first() {
    let home = TempDir::new().expect("home");
    canopy_cmd(home.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(contains("canopy init"));
}

#[test]
fn types_lists_builtin_stacks_without_a_workspace() {
    let home = TempDir::new().expect("home");
    let types = json_stdout(canopy_cmd(home.path()).args(["types", "--json"]));
    let ids: Vec<&str> = types
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert!(ids.contains(&"blank"));
    assert!(ids.contains(&"rust"));
    assert!(ids.contains(&"git"));
}

#[test]
fn create_then_list_and_show() {
    let (home, root) = initialised_home();
    canopy_cmd(home.path())
        .args(["create", "/api", "--type", "rust", "--attr", "owner=ops"])
        .assert()
        .success()
        .stdout(contains("Created /api [rust]"));
    assert!(root.join("api").is_dir());

    assert_eq!(list_paths(home.path()), vec!["/api".to_string()]);

    let shown = json_stdout(canopy_cmd(home.path()).args(["show", "api", "--json"]));
    assert_eq!(shown["type"], "rust");
    assert_eq!(shown["synced"], true);
    assert_eq!(shown["attributes"]["rust.language"][0], "Rust");

    assert_eq!(remote_paths(home.path()), vec!["/api".to_string()]);
}

#[test]
fn create_with_unknown_type_fails_and_leaves_no_folder() {
    let (home, root) = initialised_home();
    canopy_cmd(home.path())
        .args(["create", "/api", "--type", "no-such-type"])
        .assert()
        .failure()
        .stderr(contains("failed to create /api"));
    assert!(!root.join("api").exists());
    assert!(list_paths(home.path()).is_empty());
}

#[test]
fn untracked_folder_shows_up_as_detected() {
    let (home, root) = initialised_home();
    fs::create_dir_all(root.join("scratch")).expect("mkdir");

    let shown = json_stdout(canopy_cmd(home.path()).args(["show", "/scratch", "--json"]));
    assert_eq!(shown["detected"], true);
    assert_eq!(shown["type"], "blank");
    assert_eq!(shown["problems"][0]["kind"], "config_missing");

    // Detected projects never reach the remote store.
    canopy_cmd(home.path()).arg("sync").assert().success();
    let remote = home.path().join("remote.json");
    if remote.exists() {
        assert!(remote_paths(home.path()).is_empty());
    }
}

#[test]
fn resolve_reports_git_as_transient() {
    let (home, root) = initialised_home();
    canopy_cmd(home.path())
        .args(["create", "/lib", "--type", "rust"])
        .assert()
        .success();
    fs::create_dir_all(root.join("lib/.git")).expect("mkdir .git");
    fs::write(root.join("lib/.git/HEAD"), "ref: refs/heads/main\n").expect("HEAD");

    let matches = json_stdout(canopy_cmd(home.path()).args([
        "resolve",
        "/lib",
        "--transient-only",
        "--json",
    ]));
    let types: Vec<&str> = matches
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|m| m["type"].as_str())
        .collect();
    assert_eq!(types, vec!["git"]);
    assert_eq!(matches[0]["attributes"]["git.branch"][0], "main");
}

#[test]
fn estimate_matches_on_manifest() {
    let (home, root) = initialised_home();
    fs::create_dir_all(root.join("web")).expect("mkdir");
    fs::write(root.join("web/package.json"), r#"{"name":"web"}"#).expect("manifest");

    let estimation = json_stdout(canopy_cmd(home.path()).args([
        "estimate", "/web", "--type", "node", "--json",
    ]));
    assert_eq!(estimation["matched"], true);

    let estimation = json_stdout(canopy_cmd(home.path()).args([
        "estimate", "/web", "--type", "rust", "--json",
    ]));
    assert_eq!(estimation["matched"], false);
}

#[test]
fn batch_creates_parents_and_children() {
    let (home, root) = initialised_home();
    let batch = home.path().join("batch.yaml");
    fs::write(
        &batch,
        "- path: /svc/b\n  type: rust\n- path: /svc/a\n  type: blank\n  attributes:\n    owner: [ops]\n",
    )
    .expect("write batch");

    canopy_cmd(home.path())
        .arg("batch")
        .arg(&batch)
        .assert()
        .success()
        .stdout(contains("2 project(s) processed"));

    assert!(root.join("svc/a").is_dir());
    assert!(root.join("svc/b").is_dir());
    let paths = list_paths(home.path());
    assert!(paths.contains(&"/svc".to_string()));
    assert!(paths.contains(&"/svc/a".to_string()));
    assert!(paths.contains(&"/svc/b".to_string()));
    assert_eq!(remote_paths(home.path()), vec!["/svc/a".to_string(), "/svc/b".to_string()]);
}

#[test]
fn batch_with_bad_type_rolls_back() {
    let (home, root) = initialised_home();
    let batch = home.path().join("batch.yaml");
    fs::write(
        &batch,
        "- path: /one\n  type: rust\n- path: /two\n  type: not-a-type\n",
    )
    .expect("write batch");

    canopy_cmd(home.path())
        .arg("batch")
        .arg(&batch)
        .assert()
        .failure()
        .stderr(contains("batch failed"));
    assert!(!root.join("one").exists());
    assert!(!root.join("two").exists());
}

#[test]
fn import_copies_a_local_folder() {
    let (home, root) = initialised_home();
    let source = home.path().join("src-tree");
    fs::create_dir_all(source.join("src")).expect("mkdir");
    fs::write(source.join("Cargo.toml"), "[package]\nname = \"x\"\n").expect("manifest");
    fs::write(source.join("src/main.rs"), "fn main() {}\n").expect("main");

    canopy_cmd(home.path())
        .args(["import", "/imported", "--location"])
        .arg(&source)
        .assert()
        .success()
        .stdout(contains("imported 2 file(s)"));
    assert!(root.join("imported/src/main.rs").is_file());

    let shown = json_stdout(canopy_cmd(home.path()).args(["show", "/imported", "--json"]));
    assert_eq!(shown["detected"], false);
}

#[test]
fn move_carries_the_project() {
    let (home, root) = initialised_home();
    canopy_cmd(home.path())
        .args(["create", "/foo", "--type", "rust"])
        .assert()
        .success();

    canopy_cmd(home.path())
        .args(["move", "/foo", "/", "--name", "bar"])
        .assert()
        .success()
        .stdout(contains("/foo -> /bar"));
    assert!(!root.join("foo").exists());

    let shown = json_stdout(canopy_cmd(home.path()).args(["show", "/bar", "--json"]));
    assert_eq!(shown["type"], "rust");
    assert_eq!(shown["name"], "bar");
    assert_eq!(remote_paths(home.path()), vec!["/bar".to_string()]);
}

#[test]
fn type_add_and_remove_mixin() {
    let (home, _root) = initialised_home();
    canopy_cmd(home.path())
        .args(["create", "/app", "--type", "blank"])
        .assert()
        .success();

    canopy_cmd(home.path())
        .args(["type", "add", "/app", "rust"])
        .assert()
        .success()
        .stdout(contains("[rust]"));

    canopy_cmd(home.path())
        .args(["type", "remove", "/app", "rust"])
        .assert()
        .success()
        .stdout(contains("[blank]"));
}

#[test]
fn delete_removes_folder_and_remote_entry() {
    let (home, root) = initialised_home();
    canopy_cmd(home.path())
        .args(["create", "/gone", "--type", "rust"])
        .assert()
        .success();

    canopy_cmd(home.path())
        .args(["delete", "/gone"])
        .assert()
        .success()
        .stdout(contains("1 project(s) deregistered"));
    assert!(!root.join("gone").exists());
    assert!(remote_paths(home.path()).is_empty());
}
