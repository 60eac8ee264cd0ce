//! Type composition: primary + mixins → effective types and merged attributes.
//!
//! Resolution never fails. Anything that cannot be honoured is recorded as a
//! [`Problem`] and skipped: an unusable primary falls back to the Base type, an
//! unusable mixin is dropped, and on an attribute-name collision the
//! definition registered first wins.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::catalog::{AttributeDef, ProjectTypeDef, TypeCatalog};
use crate::path::ProjectPath;
use crate::types::{Problem, ProblemKind};
use crate::vfs::FolderEntry;

/// Resolved set of types for one project.
#[derive(Debug, Clone)]
pub struct ComposedTypes {
    path: ProjectPath,
    primary: Arc<ProjectTypeDef>,
    mixins: BTreeMap<String, Arc<ProjectTypeDef>>,
    attributes: BTreeMap<String, AttributeDef>,
    problems: Vec<Problem>,
}

impl ComposedTypes {
    /// Resolve `primary` and `mixins` against `catalog`.
    pub fn resolve(
        catalog: &TypeCatalog,
        path: &ProjectPath,
        primary: Option<&str>,
        mixins: &[String],
    ) -> Self {
        let mut problems = Vec::new();
        let primary_def = match primary.map(|id| (id, catalog.find(id))) {
            Some((_, Some(def))) if def.primaryable => def,
            Some((id, Some(_))) => {
                problems.push(Problem::new(
                    ProblemKind::TypeUnresolved,
                    format!("project type '{id}' at {path} cannot be used as a primary type"),
                ));
                catalog.base()
            }
            Some((id, None)) => {
                problems.push(Problem::new(
                    ProblemKind::TypeUnresolved,
                    format!("primary type '{id}' of {path} is not registered"),
                ));
                catalog.base()
            }
            None => {
                problems.push(Problem::new(
                    ProblemKind::TypeUnresolved,
                    format!("no primary type defined for {path}"),
                ));
                catalog.base()
            }
        };

        let mut composed = Self {
            path: path.clone(),
            primary: primary_def.clone(),
            mixins: BTreeMap::new(),
            attributes: BTreeMap::new(),
            problems,
        };
        composed.merge(&primary_def);

        for id in mixins {
            if *id == composed.primary.id || composed.mixins.contains_key(id) {
                continue;
            }
            let Some(def) = catalog.find(id) else {
                composed.problem(
                    ProblemKind::TypeUnresolved,
                    format!("mixin type '{id}' of {path} is not registered"),
                );
                continue;
            };
            if !def.mixable {
                composed.problem(
                    ProblemKind::TypeUnresolved,
                    format!("project type '{id}' at {path} cannot be used as a mixin"),
                );
                continue;
            }
            // Non-persisted mixins only ever come from detection.
            if !def.persisted {
                continue;
            }
            composed.merge(&def);
            composed.mixins.insert(id.clone(), def);
        }
        composed
    }

    /// Attach every transient mixin whose recognizer matches `folder`.
    ///
    /// Conflicts are checked against the whole merged table, so a transient
    /// type never shadows a configured attribute.
    pub fn add_transient(&mut self, catalog: &TypeCatalog, folder: &FolderEntry) {
        for def in catalog.list() {
            if !def.mixable || def.persisted || self.contains(&def.id) {
                continue;
            }
            if def.recognizes(folder) {
                tracing::debug!(path = %self.path, project_type = %def.id, "attached transient type");
                self.merge(&def);
                self.mixins.insert(def.id.clone(), def);
            }
        }
    }

    /// Drop the types owning `failed` attributes and strip everything they contributed.
    ///
    /// If the primary type itself is dropped, the Base type takes its place.
    pub fn reset(&mut self, catalog: &TypeCatalog, failed: &[AttributeDef]) -> Vec<String> {
        let owners: BTreeSet<String> = failed.iter().map(|a| a.project_type.clone()).collect();
        let mut removed = Vec::new();

        for owner in &owners {
            if self.mixins.remove(owner).is_some() {
                removed.push(owner.clone());
            }
        }
        if owners.contains(&self.primary.id) {
            removed.push(self.primary.id.clone());
            self.primary = catalog.base();
        }
        self.attributes
            .retain(|_, def| !removed.iter().any(|r| *r == def.project_type));

        if !removed.is_empty() {
            self.problem(
                ProblemKind::TypeUnresolved,
                format!(
                    "types {} dropped from {} because required attributes could not be resolved",
                    removed.join(", "),
                    self.path
                ),
            );
        }
        removed
    }

    fn merge(&mut self, def: &ProjectTypeDef) {
        for attr in def.attributes() {
            match self.attributes.get(&attr.name) {
                Some(existing) => {
                    let message = format!(
                        "attribute '{}' declared by '{}' at {} is already declared by '{}'",
                        attr.name, def.id, self.path, existing.project_type
                    );
                    self.problem(ProblemKind::AttributeConflict, message);
                }
                None => {
                    self.attributes.insert(attr.name.clone(), attr.clone());
                }
            }
        }
    }

    fn problem(&mut self, kind: ProblemKind, message: String) {
        tracing::debug!(path = %self.path, code = kind.code(), %message, "type composition problem");
        self.problems.push(Problem::new(kind, message));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.primary.id == id || self.mixins.contains_key(id)
    }

    pub fn primary(&self) -> &Arc<ProjectTypeDef> {
        &self.primary
    }

    pub fn mixins(&self) -> &BTreeMap<String, Arc<ProjectTypeDef>> {
        &self.mixins
    }

    /// Every resolved type, primary first.
    pub fn all(&self) -> Vec<&Arc<ProjectTypeDef>> {
        std::iter::once(&self.primary).chain(self.mixins.values()).collect()
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeDef> {
        &self.attributes
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
