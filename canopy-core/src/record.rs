//! One resolved project: composed types, attribute values, diagnostics.
//!
//! A record is immutable once built. The registry replaces entries
//! wholesale; nothing mutates a record that is already shared.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{AttributeDef, AttributeKind, TypeCatalog};
use crate::composer::ComposedTypes;
use crate::error::ProjectError;
use crate::path::ProjectPath;
use crate::types::{AttributeValue, Attributes, Problem, ProblemKind, ProjectConfig, SourceStorage};
use crate::vfs::FolderEntry;

/// How to react when required attributes cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Fail construction with [`ProjectError::Constraint`].
    Strict,
    /// Drop the offending types via [`ComposedTypes::reset`] and keep going.
    Repair,
}

#[derive(Debug, Clone)]
pub struct ProjectRecord {
    path: ProjectPath,
    config: ProjectConfig,
    folder: Option<FolderEntry>,
    types: ComposedTypes,
    attributes: Attributes,
    problems: Vec<Problem>,
    synced: bool,
    detected: bool,
}

impl ProjectRecord {
    /// Build a record, failing if a required attribute has no value.
    pub fn new(
        catalog: &TypeCatalog,
        folder: Option<FolderEntry>,
        config: Option<ProjectConfig>,
        updated: bool,
        detected: bool,
    ) -> Result<Self, ProjectError> {
        Self::build(catalog, folder, config, updated, detected, Resolution::Strict)
    }

    pub fn build(
        catalog: &TypeCatalog,
        folder: Option<FolderEntry>,
        config: Option<ProjectConfig>,
        updated: bool,
        detected: bool,
        resolution: Resolution,
    ) -> Result<Self, ProjectError> {
        let path = match (&config, &folder) {
            (Some(c), _) => c.path.clone(),
            (None, Some(f)) => f.path().clone(),
            (None, None) => {
                return Err(ProjectError::server(
                    "a project record needs either a config or a folder",
                ))
            }
        };

        let mut problems = Vec::new();
        let folder = folder.filter(FolderEntry::is_folder);
        if folder.is_none() {
            problems.push(Problem::new(
                ProblemKind::FolderMissing,
                format!("no project folder found at {path}"),
            ));
        }
        let config = match config {
            Some(mut c) => {
                c.path = path.clone();
                c
            }
            None => {
                problems.push(Problem::new(
                    ProblemKind::ConfigMissing,
                    format!("no project configuration found for {path}"),
                ));
                ProjectConfig::synthesized(&path)
            }
        };

        let mut types =
            ComposedTypes::resolve(catalog, &path, config.project_type.as_deref(), &config.mixins);
        if let Some(folder) = &folder {
            types.add_transient(catalog, folder);
        }

        let attributes = loop {
            let (values, missing) = resolve_values(&path, &types, &config, folder.as_ref())?;
            if missing.is_empty() {
                break values;
            }
            let names: Vec<String> = missing.iter().map(|a| a.name.clone()).collect();
            match resolution {
                Resolution::Strict => {
                    return Err(ProjectError::Constraint {
                        path,
                        message: format!(
                            "value for required attribute(s) {} is not initialized",
                            names.join(", ")
                        ),
                        attributes: names,
                    })
                }
                Resolution::Repair => {
                    tracing::warn!(path = %path, attributes = ?names, "repairing record with unresolved required attributes");
                    if types.reset(catalog, &missing).is_empty() {
                        return Err(ProjectError::server(format!(
                            "cannot repair {path}: no type owns {}",
                            names.join(", ")
                        )));
                    }
                }
            }
        };

        problems.extend(types.problems().iter().cloned());
        Ok(Self {
            path,
            config,
            folder,
            types,
            attributes,
            problems,
            synced: !updated,
            detected,
        })
    }

    pub fn path(&self) -> &ProjectPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn source(&self) -> Option<&SourceStorage> {
        self.config.source.as_ref()
    }

    pub fn folder(&self) -> Option<&FolderEntry> {
        self.folder.as_ref()
    }

    pub fn types(&self) -> &ComposedTypes {
        &self.types
    }

    /// Resolved primary type id.
    pub fn project_type(&self) -> &str {
        &self.types.primary().id
    }

    /// Resolved mixin ids, transient ones included.
    pub fn mixins(&self) -> Vec<String> {
        self.types.mixins().keys().cloned().collect()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn has_problem(&self, kind: ProblemKind) -> bool {
        self.problems.iter().any(|p| p.kind == kind)
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn is_detected(&self) -> bool {
        self.detected
    }

    /// Values safe to push to the remote store: variables without a provider.
    pub fn persistable_attributes(&self) -> Attributes {
        self.attributes
            .iter()
            .filter(|(name, _)| {
                self.types
                    .attributes()
                    .get(*name)
                    .map(AttributeDef::is_persistable)
                    .unwrap_or(false)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Config to push to the remote store: resolved types, persisted mixins only.
    pub fn to_config(&self) -> ProjectConfig {
        ProjectConfig {
            path: self.path.clone(),
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            project_type: Some(self.project_type().to_string()),
            mixins: self
                .types
                .mixins()
                .values()
                .filter(|t| t.persisted)
                .map(|t| t.id.clone())
                .collect(),
            attributes: self.persistable_attributes(),
            source: self.config.source.clone(),
        }
    }

    /// Copy with the `synced` flag set.
    pub fn as_synced(&self) -> Self {
        Self {
            synced: true,
            ..self.clone()
        }
    }

    /// Copy with an extra problem attached.
    pub fn with_problem(&self, problem: Problem) -> Self {
        let mut copy = self.clone();
        copy.problems.push(problem);
        copy
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            path: self.path.clone(),
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            project_type: self.project_type().to_string(),
            mixins: self.mixins(),
            attributes: self.attributes.clone(),
            problems: self.problems.clone(),
            synced: self.synced,
            detected: self.detected,
        }
    }
}

/// Serializable read-only view of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub path: ProjectPath,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub mixins: Vec<String>,
    pub attributes: Attributes,
    pub problems: Vec<Problem>,
    pub synced: bool,
    pub detected: bool,
}

/// Resolve every attribute in the merged table.
///
/// Returns the values plus the required definitions that ended up empty.
fn resolve_values(
    path: &ProjectPath,
    types: &ComposedTypes,
    config: &ProjectConfig,
    folder: Option<&FolderEntry>,
) -> Result<(Attributes, Vec<AttributeDef>), ProjectError> {
    let mut values = BTreeMap::new();
    let mut missing = Vec::new();

    for (name, def) in types.attributes() {
        let value = match &def.kind {
            AttributeKind::Constant(v) => Some(v.clone()),
            AttributeKind::Variable {
                provider: Some(provider),
            } => match folder {
                Some(folder) => provider.get_values(name, folder).map_err(|source| {
                    ProjectError::ValueResolution {
                        path: path.clone(),
                        attribute: name.clone(),
                        source,
                    }
                })?,
                None => None,
            },
            AttributeKind::Variable { provider: None } => config.attributes.get(name).cloned(),
        };

        match value {
            Some(v) if !v.is_empty() => {
                values.insert(name.clone(), v);
            }
            _ if def.required => missing.push(def.clone()),
            _ => {}
        }
    }
    Ok((values, missing))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
