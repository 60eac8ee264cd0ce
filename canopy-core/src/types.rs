//! Domain value objects: project configs, attribute values, problems.
//!
//! All types are serializable via serde so the remote store and the CLI can
//! read and write them as JSON or YAML.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::BASE_TYPE_ID;
use crate::path::ProjectPath;

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// A resolved attribute value: an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeValue(pub Vec<String>);

impl AttributeValue {
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// True when there is no value or only blank strings.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|v| v.trim().is_empty())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::single(s)
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self(vec![s])
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        Self(v)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

// ---------------------------------------------------------------------------
// Problems
// ---------------------------------------------------------------------------

/// Category of a non-fatal project diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    FolderMissing,
    ConfigMissing,
    TypeUnresolved,
    AttributeConflict,
    UpdateFailed,
}

impl ProblemKind {
    /// Stable numeric code reported to clients.
    pub fn code(self) -> u16 {
        match self {
            ProblemKind::FolderMissing => 10,
            ProblemKind::ConfigMissing => 11,
            ProblemKind::TypeUnresolved => 12,
            ProblemKind::AttributeConflict => 13,
            ProblemKind::UpdateFailed => 14,
        }
    }
}

/// A non-fatal diagnostic attached to a resolved project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub kind: ProblemKind,
    pub message: String,
}

impl Problem {
    pub fn new(kind: ProblemKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

// ---------------------------------------------------------------------------
// Configs
// ---------------------------------------------------------------------------

/// Where a project's sources come from (VCS URL, archive, local folder …).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceStorage {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl SourceStorage {
    pub fn new(source_type: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            location: Some(location.into()),
            parameters: BTreeMap::new(),
        }
    }

    /// True when a non-blank location is present, i.e. there is something to import.
    pub fn has_location(&self) -> bool {
        self.location
            .as_deref()
            .map(|l| !l.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Declarative description of a project, as persisted in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub path: ProjectPath,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(default)]
    pub mixins: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceStorage>,
}

impl ProjectConfig {
    pub fn new(path: impl Into<ProjectPath>, project_type: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: path.name().to_string(),
            path,
            project_type: Some(project_type.into()),
            ..Self::default()
        }
    }

    /// Minimal Base config used when a folder has no persisted configuration.
    pub fn synthesized(path: &ProjectPath) -> Self {
        Self::new(path.clone(), BASE_TYPE_ID)
    }

    pub fn with_mixin(mut self, mixin: impl Into<String>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: SourceStorage) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
