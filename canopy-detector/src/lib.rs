//! Built-in project types for `canopy`.
//!
//! [`register_builtin`] adds one primary type per technology stack (see
//! [`stacks::STACKS`]) plus the transient `git` mixin. Stack types carry:
//!
//! - `<id>.language`: constant
//! - `<id>.framework`: provided, inferred from manifest markers
//! - `<id>.category`: provided (`backend`, `frontend`, `mobile`, `ml`)
//!
//! Stacks with a parent (TypeScript → Node.js) inherit the parent's attributes.

use std::path::PathBuf;
use std::sync::Arc;

use canopy_core::{
    AttributeValue, FolderEntry, ProjectError, ProjectTypeDef, TypeCatalog, ValueError,
    ValueProvider,
};
use thiserror::Error;

pub mod git;
pub mod stacks;

pub use git::GIT_TYPE_ID;
pub use stacks::{Category, Inspection, Stack, STACKS};

/// Errors from manifest inspection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl From<DetectError> for ValueError {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::Io(e) => ValueError::Io(e),
            other => ValueError::storage(other.to_string()),
        }
    }
}

/// Serves `<id>.framework` and `<id>.category` for one stack.
struct StackValues {
    stack: &'static Stack,
}

impl ValueProvider for StackValues {
    fn get_values(
        &self,
        attribute: &str,
        folder: &FolderEntry,
    ) -> Result<Option<AttributeValue>, ValueError> {
        let Some(found) = self.stack.inspect(folder)? else {
            return Ok(None);
        };
        let value = match attribute.rsplit_once('.').map(|(_, field)| field) {
            Some("framework") => found.framework.map(AttributeValue::from),
            Some("category") => Some(AttributeValue::from(found.category.as_str())),
            _ => None,
        };
        Ok(value)
    }
}

fn stack_type(stack: &'static Stack) -> ProjectTypeDef {
    let provider: Arc<dyn ValueProvider> = Arc::new(StackValues { stack });
    let mut def = ProjectTypeDef::new(stack.id, stack.display_name)
        .constant(&format!("{}.language", stack.id), stack.language)
        .provided(&format!("{}.category", stack.id), false, provider.clone());
    if !stack.frameworks.is_empty() {
        def = def.provided(&format!("{}.framework", stack.id), false, provider);
    }
    if let Some(parent) = stack.parent {
        def = def.with_parent(parent);
    }
    def.recognizer(Arc::new(move |folder: &FolderEntry| stack.recognizes(folder)))
}

fn git_type() -> ProjectTypeDef {
    let provider: Arc<dyn ValueProvider> = Arc::new(git::GitMetadata);
    ProjectTypeDef::new(GIT_TYPE_ID, "Git repository")
        .primaryable(false)
        .persisted(false)
        .provided(git::BRANCH_ATTR, false, provider.clone())
        .provided(git::ORIGIN_ATTR, false, provider)
        .recognizer(Arc::new(git::is_repository))
}

/// Register every built-in type. Parents are registered before children.
pub fn register_builtin(catalog: &mut TypeCatalog) -> Result<(), ProjectError> {
    let (roots, children): (Vec<&'static Stack>, Vec<&'static Stack>) =
        STACKS.iter().partition(|s| s.parent.is_none());
    for stack in roots.into_iter().chain(children) {
        catalog.register(stack_type(stack))?;
    }
    catalog.register(git_type())
}

/// A catalog holding the Base type plus all built-ins.
pub fn builtin_catalog() -> Result<TypeCatalog, ProjectError> {
    let mut catalog = TypeCatalog::new();
    register_builtin(&mut catalog)?;
    Ok(catalog)
}

/// First stack, in priority order, that recognizes `folder`.
pub fn detect_stack(folder: &FolderEntry) -> Option<&'static Stack> {
    STACKS
        .iter()
        .filter(|s| s.parent.is_none())
        .find(|s| s.recognizes(folder))
}
