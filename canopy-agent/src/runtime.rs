use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::Instant;

use canopy_core::{Indexer, ProjectError, ProjectEvent, ProjectPath, VfsEntry};

use crate::config::{self, Settings};
use crate::error::{io_err, AgentError};
use crate::workspace::Workspace;

/// Filesystem change relevant to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsChange {
    Created,
    Modified,
    Removed,
}

impl FsChange {
    fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FsChange::Created),
            EventKind::Modify(_) => Some(FsChange::Modified),
            EventKind::Remove(_) => Some(FsChange::Removed),
            _ => None,
        }
    }
}

/// Start the agent runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, json_logs: bool) -> Result<(), AgentError> {
    init_tracing(json_logs);
    let settings = config::load_at(home)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(settings))
}

/// Run the agent: load the workspace, then watch it until ctrl-c.
pub async fn run(settings: Settings) -> Result<(), AgentError> {
    let debounce = settings.debounce();
    let workspace = tokio::task::spawn_blocking(move || -> Result<Workspace, AgentError> {
        let workspace = Workspace::open(settings)?;
        let report = workspace.init()?;
        let queued = workspace.reindex_all()?;
        tracing::info!(
            root = %workspace.settings().workspace_root.display(),
            synced = report.actions.len(),
            queued,
            "workspace ready",
        );
        Ok(workspace)
    })
    .await
    .map_err(|err| AgentError::Join {
        task: "startup",
        message: err.to_string(),
    })??;
    let workspace = Arc::new(workspace);

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let workspace = workspace.clone();
        tokio::spawn(async move {
            let result = watcher_task(workspace, debounce, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let events_handle = {
        let shutdown = shutdown_tx.clone();
        let workspace = workspace.clone();
        tokio::spawn(async move {
            let result = registry_events_task(workspace, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down agent");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(io_err("ctrl-c handler", err)),
                    }
                }
            }
        })
    };

    let (watcher_result, events_result, signal_result) =
        tokio::join!(watcher_handle, events_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("registry_events", events_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn watcher_task(
    workspace: Arc<Workspace>,
    threshold: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    let root = workspace.settings().workspace_root.clone();
    // Events arrive with resolved paths (e.g. /private/var on macOS).
    let root = std::fs::canonicalize(&root).unwrap_or(root);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "watching workspace");

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if workspace.watcher().is_suspended() {
                    continue;
                }
                let Some(change) = FsChange::from_kind(&event.kind) else { continue };

                for path in event.paths {
                    let Some(vpath) = virtual_path(&root, &path) else { continue };
                    if change != FsChange::Removed
                        && !should_process_event_with_threshold(&mut debounce, &path, Instant::now(), threshold)
                    {
                        continue;
                    }
                    let ws = workspace.clone();
                    let target = vpath.clone();
                    match tokio::task::spawn_blocking(move || apply_change(&ws, &target, change)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            tracing::warn!(path = %vpath, ?change, error = %err, "failed to apply filesystem change");
                        }
                        Err(err) => {
                            tracing::error!(path = %vpath, error = %err, "filesystem change task panicked");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

async fn registry_events_task(
    workspace: Arc<Workspace>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    let mut events = workspace.registry().subscribe();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = events.recv() => match event {
                Ok(ProjectEvent::Deleted(path)) => {
                    tracing::debug!(path = %path, "dropping index entries of deleted project");
                    workspace.indexer().remove_under(&path);
                }
                Ok(ProjectEvent::Registered(path)) => {
                    tracing::debug!(path = %path, "project registered");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "registry event consumer lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

/// Reflect one filesystem change in the registry and the index.
///
/// New top-level folders become detected projects. Removing a project
/// folder deregisters it and every project below it.
pub fn apply_change(
    workspace: &Workspace,
    path: &ProjectPath,
    change: FsChange,
) -> Result<(), ProjectError> {
    let registry = workspace.registry();
    let vfs = registry.vfs();
    match change {
        FsChange::Created | FsChange::Modified => match vfs.get(path) {
            Some(VfsEntry::Folder(folder)) => {
                if path.depth() == 1 && registry.get_project(path)?.is_none() {
                    let record = registry.put_project(None, Some(folder), false, true)?;
                    tracing::info!(path = %path, project_type = record.project_type(), "detected new project folder");
                    workspace.manager().reindex_project(&record);
                }
            }
            Some(file @ VfsEntry::File(_)) => workspace.indexer().add(&file)?,
            None => {}
        },
        FsChange::Removed => {
            if vfs.exists(path) {
                return Ok(());
            }
            workspace.indexer().remove_under(path);
            let removed = registry.remove_projects(path);
            if !removed.is_empty() {
                tracing::info!(path = %path, projects = removed.len(), "project folder removed on disk");
                workspace.manager().sync()?;
            }
        }
    }
    Ok(())
}

fn virtual_path(root: &Path, physical: &Path) -> Option<ProjectPath> {
    let rel = physical.strip_prefix(root).ok()?;
    let path = ProjectPath::new(&rel.to_string_lossy().replace('\\', "/"));
    (!path.is_root()).then_some(path)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), AgentError>, tokio::task::JoinError>,
) -> Result<(), AgentError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(AgentError::Join {
            task,
            message: err.to_string(),
        }),
    }
}

/// Install the global subscriber on stderr. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteSettings;
    use tempfile::TempDir;
    use tokio::time::advance;

    fn workspace(dir: &TempDir) -> Workspace {
        let settings = Settings::new(
            dir.path().join("ws"),
            RemoteSettings::File {
                path: dir.path().join("remote.json"),
            },
        );
        let workspace = Workspace::open(settings).expect("open");
        workspace.init().expect("init");
        workspace
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_events() {
        let threshold = Duration::from_millis(100);
        let mut debounce = HashMap::<PathBuf, Instant>::new();
        let path = PathBuf::from("/tmp/ws/api/Cargo.toml");
        let mut triggers = 0usize;

        for _ in 0..5 {
            if should_process_event_with_threshold(&mut debounce, &path, Instant::now(), threshold) {
                triggers += 1;
            }
            advance(Duration::from_millis(10)).await;
        }
        advance(Duration::from_millis(150)).await;
        assert_eq!(triggers, 1, "rapid saves should collapse to one trigger");

        assert!(should_process_event_with_threshold(
            &mut debounce,
            &path,
            Instant::now(),
            threshold
        ));
    }

    #[test]
    fn new_top_level_folder_becomes_detected_project() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        std::fs::create_dir_all(dir.path().join("ws/api")).unwrap();
        std::fs::write(dir.path().join("ws/api/go.mod"), "module api\n").unwrap();

        let path = ProjectPath::from("/api");
        apply_change(&ws, &path, FsChange::Created).unwrap();

        let record = ws.registry().get_project(&path).unwrap().expect("registered");
        assert!(record.is_detected());
        assert_eq!(record.project_type(), canopy_core::BASE_TYPE_ID);
        let codes: Vec<u16> = record.problems().iter().map(|p| p.code()).collect();
        assert_eq!(codes, vec![11]);
    }

    #[test]
    fn nested_folder_is_not_registered() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        std::fs::create_dir_all(dir.path().join("ws/api/src")).unwrap();

        apply_change(&ws, &ProjectPath::from("/api/src"), FsChange::Created).unwrap();
        assert!(ws.registry().get_project(&"/api/src".into()).unwrap().is_none());
    }

    #[test]
    fn removed_folder_deregisters_project() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("ws/web")).unwrap();
        let ws = workspace(&dir);
        let path = ProjectPath::from("/web");
        assert!(ws.registry().get_project(&path).unwrap().is_some());

        std::fs::remove_dir_all(dir.path().join("ws/web")).unwrap();
        apply_change(&ws, &path, FsChange::Removed).unwrap();
        assert!(ws.registry().get_project(&path).unwrap().is_none());
    }

    #[test]
    fn created_file_is_indexed() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        std::fs::create_dir_all(dir.path().join("ws/docs")).unwrap();
        std::fs::write(dir.path().join("ws/docs/README.md"), "# docs").unwrap();

        apply_change(&ws, &"/docs/README.md".into(), FsChange::Modified).unwrap();
        assert_eq!(ws.indexer().search("readme.md"), vec![ProjectPath::from("/docs/README.md")]);
    }
}
