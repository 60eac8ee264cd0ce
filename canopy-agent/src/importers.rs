//! Built-in importers.

use std::fs;
use std::path::Path;

use canopy_core::{FolderEntry, LineConsumer, ProjectError, ProjectImporter, SourceStorage};
use walkdir::WalkDir;

pub const FOLDER_SOURCE: &str = "folder";

/// Copies a local directory tree into the target folder.
///
/// `location` is a physical path. Set parameter `skip_hidden=true` to leave
/// out dot-entries (`.git`, `.idea`, …).
#[derive(Debug, Default)]
pub struct FolderImporter;

impl ProjectImporter for FolderImporter {
    fn source_type(&self) -> &str {
        FOLDER_SOURCE
    }

    fn import_sources(
        &self,
        target: &FolderEntry,
        source: &SourceStorage,
        output: &mut dyn LineConsumer,
    ) -> Result<(), ProjectError> {
        let location = source
            .location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| ProjectError::conflict("folder import needs a location"))?;
        let from = Path::new(location);
        if !from.is_dir() {
            return Err(ProjectError::not_found(format!(
                "import source {location} is not a directory"
            )));
        }
        let skip_hidden = source
            .parameters
            .get("skip_hidden")
            .map(|v| v == "true")
            .unwrap_or(false);

        output.write_line(&format!("importing {location} into {}", target.path()));
        let walker = WalkDir::new(from)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(skip_hidden && e.file_name().to_string_lossy().starts_with('.')));

        let mut files = 0usize;
        for entry in walker {
            let entry = entry
                .map_err(|e| ProjectError::server_with(format!("failed to read {location}"), e))?;
            let Ok(rel) = entry.path().strip_prefix(from) else { continue };
            let dest = target.physical_path().join(rel);
            let copied = if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)
            } else {
                fs::copy(entry.path(), &dest).map(|_| ())
            };
            copied.map_err(|e| {
                ProjectError::server_with(format!("failed to copy {}", rel.display()), e)
            })?;
            if entry.file_type().is_file() {
                files += 1;
                output.write_line(&rel.to_string_lossy());
            }
        }
        output.write_line(&format!("imported {files} file(s)"));
        tracing::info!(path = %target.path(), files, "folder import finished");
        Ok(())
    }
}
