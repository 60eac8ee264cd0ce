//! Transient `git` mixin: attached to any folder with a `.git` directory.

use canopy_core::{AttributeValue, FolderEntry, ValueError, ValueProvider};

pub const GIT_TYPE_ID: &str = "git";
pub const BRANCH_ATTR: &str = "git.branch";
pub const ORIGIN_ATTR: &str = "git.origin";

pub(crate) fn is_repository(folder: &FolderEntry) -> bool {
    folder.physical_path().join(".git").is_dir()
}

/// Reads repository metadata straight from `.git/`.
pub(crate) struct GitMetadata;

impl ValueProvider for GitMetadata {
    fn get_values(
        &self,
        attribute: &str,
        folder: &FolderEntry,
    ) -> Result<Option<AttributeValue>, ValueError> {
        match attribute {
            BRANCH_ATTR => Ok(folder
                .read_to_string(".git/HEAD")?
                .and_then(|head| branch_from_head(&head))
                .map(AttributeValue::from)),
            ORIGIN_ATTR => Ok(folder
                .read_to_string(".git/config")?
                .and_then(|config| origin_url(&config))
                .map(AttributeValue::from)),
            _ => Ok(None),
        }
    }
}

/// `ref: refs/heads/main` → `main`; a detached HEAD yields the short hash.
fn branch_from_head(head: &str) -> Option<String> {
    let head = head.trim();
    if let Some(reference) = head.strip_prefix("ref:") {
        let reference = reference.trim();
        return Some(
            reference
                .strip_prefix("refs/heads/")
                .unwrap_or(reference)
                .to_string(),
        );
    }
    if head.len() >= 7 && head.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(head[..7].to_string());
    }
    None
}

fn origin_url(config: &str) -> Option<String> {
    let mut in_origin = false;
    for line in config.lines().map(str::trim) {
        if line.starts_with('[') {
            in_origin = line == "[remote \"origin\"]";
            continue;
        }
        if !in_origin {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "url" {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_parsing() {
        assert_eq!(branch_from_head("ref: refs/heads/main\n").as_deref(), Some("main"));
        assert_eq!(
            branch_from_head("ref: refs/heads/feature/login").as_deref(),
            Some("feature/login")
        );
        assert_eq!(
            branch_from_head("3f2a9c1d7e0b4a5c6d7e8f90a1b2c3d4e5f6a7b8").as_deref(),
            Some("3f2a9c1")
        );
        assert_eq!(branch_from_head("garbage"), None);
    }

    #[test]
    fn origin_only_from_origin_section() {
        let config = "[core]\n\tbare = false\n[remote \"upstream\"]\n\turl = https://up/x.git\n\
                      [remote \"origin\"]\n\turl = git@host:team/repo.git\n\tfetch = +refs/heads/*\n";
        assert_eq!(origin_url(config).as_deref(), Some("git@host:team/repo.git"));
        assert_eq!(origin_url("[core]\n"), None);
    }
}
