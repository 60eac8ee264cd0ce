//! Disk-backed virtual filesystem.
//!
//! The VFS maps [`ProjectPath`]s onto a physical root directory. Everything
//! the registry and manager touch on disk goes through here so that I/O
//! failures are translated into [`ProjectError`] in one place.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ProjectError;
use crate::path::ProjectPath;

/// Translate an I/O failure at `path` into the project error taxonomy.
pub fn io_err(path: &ProjectPath, err: io::Error) -> ProjectError {
    match err.kind() {
        ErrorKind::NotFound => ProjectError::NotFound(format!("{path}: {err}")),
        ErrorKind::AlreadyExists => ProjectError::Conflict(format!("{path} already exists")),
        ErrorKind::PermissionDenied => ProjectError::Forbidden(format!("{path}: {err}")),
        _ => ProjectError::server_with(format!("I/O error at {path}"), err),
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Handle to a folder inside the VFS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    path: ProjectPath,
    physical: PathBuf,
}

impl FolderEntry {
    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    pub fn physical_path(&self) -> &Path {
        &self.physical
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Still present on disk as a directory.
    pub fn is_folder(&self) -> bool {
        self.physical.is_dir()
    }

    pub fn has_child(&self, relative: &str) -> bool {
        self.physical.join(relative).exists()
    }

    pub fn child(&self, relative: &str) -> Option<VfsEntry> {
        entry_at(self.path.join(relative), self.physical.join(relative))
    }

    /// Read a child file as UTF-8. `Ok(None)` when it does not exist.
    pub fn read_to_string(&self, relative: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.physical.join(relative)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn write(&self, relative: &str, content: &[u8]) -> io::Result<()> {
        let target = self.physical.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, content)
    }
}

/// Handle to a regular file inside the VFS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    path: ProjectPath,
    physical: PathBuf,
}

impl FileEntry {
    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    pub fn physical_path(&self) -> &Path {
        &self.physical
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        fs::read_to_string(&self.physical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VfsEntry {
    Folder(FolderEntry),
    File(FileEntry),
}

impl VfsEntry {
    pub fn path(&self) -> &ProjectPath {
        match self {
            VfsEntry::Folder(f) => f.path(),
            VfsEntry::File(f) => f.path(),
        }
    }

    pub fn physical_path(&self) -> &Path {
        match self {
            VfsEntry::Folder(f) => f.physical_path(),
            VfsEntry::File(f) => f.physical_path(),
        }
    }

    pub fn as_folder(&self) -> Option<&FolderEntry> {
        match self {
            VfsEntry::Folder(f) => Some(f),
            VfsEntry::File(_) => None,
        }
    }
}

fn entry_at(path: ProjectPath, physical: PathBuf) -> Option<VfsEntry> {
    let meta = fs::metadata(&physical).ok()?;
    if meta.is_dir() {
        Some(VfsEntry::Folder(FolderEntry { path, physical }))
    } else {
        Some(VfsEntry::File(FileEntry { path, physical }))
    }
}

// ---------------------------------------------------------------------------
// Vfs
// ---------------------------------------------------------------------------

/// Virtual filesystem rooted at a physical directory.
#[derive(Debug, Clone)]
pub struct Vfs {
    root: PathBuf,
}

impl Vfs {
    /// Open (and create if absent) the VFS rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_err(&ProjectPath::root(), e))?;
        Ok(Self { root })
    }

    pub fn physical_root(&self) -> &Path {
        &self.root
    }

    pub fn physical_path(&self, path: &ProjectPath) -> PathBuf {
        path.segments().fold(self.root.clone(), |acc, s| acc.join(s))
    }

    /// Map a physical path back onto the VFS, if it lies under the root.
    pub fn virtual_path(&self, physical: &Path) -> Option<ProjectPath> {
        let rel = physical.strip_prefix(&self.root).ok()?;
        Some(ProjectPath::new(&rel.to_string_lossy().replace('\\', "/")))
    }

    pub fn root(&self) -> FolderEntry {
        FolderEntry {
            path: ProjectPath::root(),
            physical: self.root.clone(),
        }
    }

    pub fn get(&self, path: &ProjectPath) -> Option<VfsEntry> {
        entry_at(path.clone(), self.physical_path(path))
    }

    pub fn exists(&self, path: &ProjectPath) -> bool {
        self.physical_path(path).exists()
    }

    pub fn folder(&self, path: &ProjectPath) -> Option<FolderEntry> {
        match self.get(path)? {
            VfsEntry::Folder(f) => Some(f),
            VfsEntry::File(_) => None,
        }
    }

    /// Create `path` and any missing parents. Reuses an existing folder.
    pub fn create_folder(&self, path: &ProjectPath) -> Result<FolderEntry, ProjectError> {
        let physical = self.physical_path(path);
        if physical.is_file() {
            return Err(ProjectError::conflict(format!(
                "{path} exists and is not a folder"
            )));
        }
        fs::create_dir_all(&physical).map_err(|e| io_err(path, e))?;
        Ok(FolderEntry {
            path: path.clone(),
            physical,
        })
    }

    /// Create a new file `name` under `parent`. Fails with Conflict if it already exists.
    pub fn create_file(
        &self,
        parent: &ProjectPath,
        name: &str,
        content: &[u8],
    ) -> Result<FileEntry, ProjectError> {
        let folder = self
            .folder(parent)
            .ok_or_else(|| ProjectError::not_found(format!("folder {parent} not found")))?;
        let path = parent.join(name);
        let physical = folder.physical.join(name);
        if physical.exists() {
            return Err(ProjectError::conflict(format!("{path} already exists")));
        }
        fs::write(&physical, content).map_err(|e| io_err(&path, e))?;
        Ok(FileEntry { path, physical })
    }

    /// Delete a file or a folder tree.
    pub fn delete(&self, path: &ProjectPath) -> Result<(), ProjectError> {
        if path.is_root() {
            return Err(ProjectError::Forbidden("the workspace root cannot be deleted".into()));
        }
        match self.get(path) {
            Some(VfsEntry::Folder(f)) => fs::remove_dir_all(&f.physical).map_err(|e| io_err(path, e)),
            Some(VfsEntry::File(f)) => fs::remove_file(&f.physical).map_err(|e| io_err(path, e)),
            None => Err(ProjectError::not_found(format!("{path} not found"))),
        }
    }

    /// Move `source` into `target_parent`, optionally renaming it.
    pub fn move_to(
        &self,
        source: &ProjectPath,
        target_parent: &ProjectPath,
        new_name: Option<&str>,
        overwrite: bool,
    ) -> Result<VfsEntry, ProjectError> {
        let target = self.prepare_target(source, target_parent, new_name, overwrite)?;
        fs::rename(self.physical_path(source), self.physical_path(&target))
            .map_err(|e| io_err(&target, e))?;
        self.get(&target)
            .ok_or_else(|| ProjectError::server(format!("{target} vanished after move")))
    }

    /// Copy `source` (recursively) into `target_parent`, optionally renaming it.
    pub fn copy_to(
        &self,
        source: &ProjectPath,
        target_parent: &ProjectPath,
        new_name: Option<&str>,
        overwrite: bool,
    ) -> Result<VfsEntry, ProjectError> {
        let target = self.prepare_target(source, target_parent, new_name, overwrite)?;
        copy_tree(&self.physical_path(source), &self.physical_path(&target))
            .map_err(|e| io_err(&target, e))?;
        self.get(&target)
            .ok_or_else(|| ProjectError::server(format!("{target} vanished after copy")))
    }

    /// Immediate child folders of `path`, sorted by name.
    pub fn child_folders(&self, path: &ProjectPath) -> Result<Vec<FolderEntry>, ProjectError> {
        let physical = self.physical_path(path);
        let mut entries: Vec<_> = fs::read_dir(&physical)
            .map_err(|e| io_err(path, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .collect();
        entries.sort_by_key(|e| e.file_name());
        Ok(entries
            .into_iter()
            .map(|e| FolderEntry {
                path: path.join(&e.file_name().to_string_lossy()),
                physical: e.path(),
            })
            .collect())
    }

    /// Every entry under `path` (inclusive), parents before children.
    pub fn walk(&self, path: &ProjectPath) -> Result<Vec<VfsEntry>, ProjectError> {
        let physical = self.physical_path(path);
        let mut out = Vec::new();
        for entry in WalkDir::new(&physical).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                ProjectError::server_with(format!("failed to walk {path}"), e)
            })?;
            let Some(vpath) = self.virtual_path(entry.path()) else { continue };
            if let Some(item) = entry_at(vpath, entry.path().to_path_buf()) {
                out.push(item);
            }
        }
        Ok(out)
    }

    fn prepare_target(
        &self,
        source: &ProjectPath,
        target_parent: &ProjectPath,
        new_name: Option<&str>,
        overwrite: bool,
    ) -> Result<ProjectPath, ProjectError> {
        if source.is_root() {
            return Err(ProjectError::Forbidden("the workspace root cannot be relocated".into()));
        }
        if !self.exists(source) {
            return Err(ProjectError::not_found(format!("{source} not found")));
        }
        if self.folder(target_parent).is_none() {
            return Err(ProjectError::not_found(format!("folder {target_parent} not found")));
        }
        let target = target_parent.join(new_name.unwrap_or(source.name()));
        if target.starts_with(source) {
            return Err(ProjectError::conflict(format!(
                "cannot place {source} inside itself ({target})"
            )));
        }
        if source.starts_with(&target) {
            return Err(ProjectError::conflict(format!(
                "cannot replace {target} with its own descendant {source}"
            )));
        }
        if self.exists(&target) {
            if !overwrite {
                return Err(ProjectError::conflict(format!("{target} already exists")));
            }
            self.delete(&target)?;
        }
        Ok(target)
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_file() {
        fs::copy(from, to)?;
        return Ok(());
    }
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vfs() -> (TempDir, Vfs) {
        let dir = TempDir::new().expect("tempdir");
        let vfs = Vfs::new(dir.path()).expect("vfs");
        (dir, vfs)
    }

    #[test]
    fn create_folder_creates_parents() {
        let (_dir, vfs) = vfs();
        let f = vfs.create_folder(&ProjectPath::new("/a/b/c")).expect("create");
        assert!(f.is_folder());
        assert!(vfs.folder(&ProjectPath::new("/a")).is_some());
    }

    #[test]
    fn create_file_conflicts_on_existing() {
        let (_dir, vfs) = vfs();
        vfs.create_folder(&ProjectPath::new("/p")).unwrap();
        vfs.create_file(&ProjectPath::new("/p"), "README", b"hi").unwrap();
        let err = vfs
            .create_file(&ProjectPath::new("/p"), "README", b"again")
            .unwrap_err();
        assert!(matches!(err, ProjectError::Conflict(_)), "got: {err}");
    }

    #[test]
    fn move_refuses_existing_target_without_overwrite() {
        let (_dir, vfs) = vfs();
        vfs.create_folder(&ProjectPath::new("/foo")).unwrap();
        vfs.create_folder(&ProjectPath::new("/bar")).unwrap();
        let err = vfs
            .move_to(&ProjectPath::new("/foo"), &ProjectPath::root(), Some("bar"), false)
            .unwrap_err();
        assert!(matches!(err, ProjectError::Conflict(_)));
    }

    #[test]
    fn copy_is_recursive() {
        let (_dir, vfs) = vfs();
        let src = vfs.create_folder(&ProjectPath::new("/src/inner")).unwrap();
        src.write("file.txt", b"content").unwrap();
        vfs.copy_to(&ProjectPath::new("/src"), &ProjectPath::root(), Some("dst"), false)
            .unwrap();
        let copied = vfs.folder(&ProjectPath::new("/dst/inner")).expect("copied");
        assert_eq!(copied.read_to_string("file.txt").unwrap().as_deref(), Some("content"));
    }

    #[test]
    fn cannot_move_into_itself() {
        let (_dir, vfs) = vfs();
        vfs.create_folder(&ProjectPath::new("/a/b")).unwrap();
        let err = vfs
            .move_to(&ProjectPath::new("/a"), &ProjectPath::new("/a/b"), None, false)
            .unwrap_err();
        assert!(matches!(err, ProjectError::Conflict(_)));
    }

    #[test]
    fn cannot_overwrite_an_ancestor_of_the_source() {
        let (_dir, vfs) = vfs();
        let b = vfs.create_folder(&ProjectPath::new("/a/b")).unwrap();
        b.write("precious.txt", b"keep").unwrap();

        let err = vfs
            .move_to(&ProjectPath::new("/a/b"), &ProjectPath::root(), Some("a"), true)
            .unwrap_err();
        assert!(matches!(err, ProjectError::Conflict(_)), "got: {err}");
        let err = vfs
            .copy_to(&ProjectPath::new("/a/b"), &ProjectPath::root(), Some("a"), true)
            .unwrap_err();
        assert!(matches!(err, ProjectError::Conflict(_)), "got: {err}");

        let b = vfs.folder(&ProjectPath::new("/a/b")).expect("subtree kept");
        assert_eq!(b.read_to_string("precious.txt").unwrap().as_deref(), Some("keep"));
    }

    #[test]
    fn walk_lists_parents_first() {
        let (_dir, vfs) = vfs();
        let f = vfs.create_folder(&ProjectPath::new("/p/src")).unwrap();
        f.write("main.rs", b"fn main() {}").unwrap();
        let paths: Vec<String> = vfs
            .walk(&ProjectPath::new("/p"))
            .unwrap()
            .iter()
            .map(|e| e.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/p", "/p/src", "/p/src/main.rs"]);
    }

    #[test]
    fn root_cannot_be_deleted() {
        let (_dir, vfs) = vfs();
        assert!(matches!(
            vfs.delete(&ProjectPath::root()),
            Err(ProjectError::Forbidden(_))
        ));
    }
}
