//! Project type definitions and the catalog that holds them.
//!
//! The catalog is populated once at startup and shared read-only behind an
//! `Arc`. Lookups return `Option`/`Result` rather than panicking, and the
//! built-in Base type ([`BASE_TYPE_ID`]) is always present.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ProjectError, ValueError};
use crate::types::{AttributeValue, Attributes};
use crate::vfs::FolderEntry;

/// Id of the built-in fallback primary type.
pub const BASE_TYPE_ID: &str = "blank";

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Computes an attribute value from a project's folder content.
pub trait ValueProvider: Send + Sync {
    fn get_values(&self, attribute: &str, folder: &FolderEntry)
        -> Result<Option<AttributeValue>, ValueError>;

    /// Settable providers accept values pushed from a project config.
    fn is_settable(&self) -> bool {
        false
    }

    fn set_values(
        &self,
        attribute: &str,
        _folder: &FolderEntry,
        _value: &AttributeValue,
    ) -> Result<(), ValueError> {
        Err(ValueError::ReadOnly(attribute.to_string()))
    }
}

/// Decides whether a folder's sources look like a given project type.
pub trait SourceRecognizer: Send + Sync {
    fn recognize(&self, folder: &FolderEntry) -> bool;
}

impl<F> SourceRecognizer for F
where
    F: Fn(&FolderEntry) -> bool + Send + Sync,
{
    fn recognize(&self, folder: &FolderEntry) -> bool {
        self(folder)
    }
}

// ---------------------------------------------------------------------------
// Attribute definitions
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum AttributeKind {
    Constant(AttributeValue),
    Variable {
        provider: Option<Arc<dyn ValueProvider>>,
    },
}

impl fmt::Debug for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            AttributeKind::Variable { provider } => f
                .debug_struct("Variable")
                .field("provided", &provider.is_some())
                .finish(),
        }
    }
}

impl PartialEq for AttributeKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeKind::Constant(a), AttributeKind::Constant(b)) => a == b,
            (AttributeKind::Variable { provider: a }, AttributeKind::Variable { provider: b }) => {
                match (a, b) {
                    (None, None) => true,
                    (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// One attribute declared by a project type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    pub name: String,
    /// Id of the type carrying this definition.
    pub project_type: String,
    pub description: String,
    pub required: bool,
    pub kind: AttributeKind,
}

impl AttributeDef {
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, AttributeKind::Variable { .. })
    }

    pub fn provider(&self) -> Option<&Arc<dyn ValueProvider>> {
        match &self.kind {
            AttributeKind::Variable { provider } => provider.as_ref(),
            AttributeKind::Constant(_) => None,
        }
    }

    /// User-settable: variable with no provider. Only these are pushed to the remote store.
    pub fn is_persistable(&self) -> bool {
        matches!(self.kind, AttributeKind::Variable { provider: None })
    }
}

// ---------------------------------------------------------------------------
// Project type definitions
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ProjectTypeDef {
    pub id: String,
    pub display_name: String,
    pub primaryable: bool,
    pub mixable: bool,
    pub persisted: bool,
    pub parents: Vec<String>,
    attributes: Vec<AttributeDef>,
    recognizer: Option<Arc<dyn SourceRecognizer>>,
}

impl fmt::Debug for ProjectTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectTypeDef")
            .field("id", &self.id)
            .field("primaryable", &self.primaryable)
            .field("mixable", &self.mixable)
            .field("persisted", &self.persisted)
            .field("parents", &self.parents)
            .field("attributes", &self.attributes)
            .field("recognizer", &self.recognizer.is_some())
            .finish()
    }
}

impl ProjectTypeDef {
    /// A primaryable, mixable, persisted type with no attributes.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            primaryable: true,
            mixable: true,
            persisted: true,
            parents: Vec::new(),
            attributes: Vec::new(),
            recognizer: None,
        }
    }

    pub fn primaryable(mut self, value: bool) -> Self {
        self.primaryable = value;
        self
    }

    pub fn mixable(mut self, value: bool) -> Self {
        self.mixable = value;
        self
    }

    pub fn persisted(mut self, value: bool) -> Self {
        self.persisted = value;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn constant(self, name: &str, value: impl Into<AttributeValue>) -> Self {
        let kind = AttributeKind::Constant(value.into());
        self.attribute(name, true, kind)
    }

    pub fn variable(self, name: &str, required: bool) -> Self {
        self.attribute(name, required, AttributeKind::Variable { provider: None })
    }

    pub fn provided(self, name: &str, required: bool, provider: Arc<dyn ValueProvider>) -> Self {
        let kind = AttributeKind::Variable {
            provider: Some(provider),
        };
        self.attribute(name, required, kind)
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn SourceRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    fn attribute(mut self, name: &str, required: bool, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDef {
            name: name.to_string(),
            project_type: self.id.clone(),
            description: String::new(),
            required,
            kind,
        });
        self
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    pub fn attribute_def(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Run the source-recognition predicate. Types without one never match.
    pub fn recognizes(&self, folder: &FolderEntry) -> bool {
        self.recognizer
            .as_ref()
            .map(|r| r.recognize(folder))
            .unwrap_or(false)
    }

    /// Estimate how well `folder` fits this type.
    ///
    /// Provider failures on individual attributes are skipped: estimation is a
    /// best-effort query, not a construction.
    pub fn estimate(&self, folder: &FolderEntry) -> SourceEstimation {
        let matched = self.recognizes(folder);
        let mut attributes = Attributes::new();
        if matched {
            for def in &self.attributes {
                let Some(provider) = def.provider() else { continue };
                match provider.get_values(&def.name, folder) {
                    Ok(Some(value)) if !value.is_empty() => {
                        attributes.insert(def.name.clone(), value);
                    }
                    Ok(_) => {}
                    Err(err) => tracing::debug!(
                        project_type = %self.id,
                        attribute = %def.name,
                        error = %err,
                        "estimation provider failed",
                    ),
                }
            }
        }
        SourceEstimation {
            project_type: self.id.clone(),
            matched,
            attributes,
        }
    }
}

/// Outcome of running one type's recognizer against a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceEstimation {
    #[serde(rename = "type")]
    pub project_type: String,
    pub matched: bool,
    pub attributes: Attributes,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Registry of project types keyed by id.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    types: BTreeMap<String, Arc<ProjectTypeDef>>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalog {
    /// A catalog holding only the Base type.
    pub fn new() -> Self {
        let base = ProjectTypeDef::new(BASE_TYPE_ID, "Blank").mixable(false);
        let mut types = BTreeMap::new();
        types.insert(BASE_TYPE_ID.to_string(), Arc::new(base));
        Self { types }
    }

    /// Register a type. Parents must already be registered; their attributes
    /// are inherited and re-owned by the new type.
    pub fn register(&mut self, mut def: ProjectTypeDef) -> Result<(), ProjectError> {
        if def.id.trim().is_empty() {
            return Err(ProjectError::conflict("project type id must not be empty"));
        }
        if self.types.contains_key(&def.id) {
            return Err(ProjectError::conflict(format!(
                "project type '{}' is already registered",
                def.id
            )));
        }

        let mut inherited: Vec<AttributeDef> = Vec::new();
        for parent_id in &def.parents {
            let parent = self.get(parent_id)?;
            for attr in parent.attributes() {
                if inherited.iter().any(|a| a.name == attr.name) {
                    continue;
                }
                let mut attr = attr.clone();
                attr.project_type = def.id.clone();
                inherited.push(attr);
            }
        }
        for own in &def.attributes {
            if inherited.iter().any(|a| a.name == own.name) {
                return Err(ProjectError::conflict(format!(
                    "attribute '{}' of type '{}' is already declared by a parent type",
                    own.name, def.id
                )));
            }
        }
        inherited.append(&mut def.attributes);
        def.attributes = inherited;

        tracing::debug!(project_type = %def.id, "registered project type");
        self.types.insert(def.id.clone(), Arc::new(def));
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<Arc<ProjectTypeDef>> {
        self.types.get(id).cloned()
    }

    pub fn get(&self, id: &str) -> Result<Arc<ProjectTypeDef>, ProjectError> {
        self.find(id)
            .ok_or_else(|| ProjectError::not_found(format!("project type '{id}' not found")))
    }

    pub fn base(&self) -> Arc<ProjectTypeDef> {
        self.types[BASE_TYPE_ID].clone()
    }

    pub fn list(&self) -> Vec<Arc<ProjectTypeDef>> {
        self.types.values().cloned().collect()
    }

    /// Number of ancestors on the longest parent chain of `id`.
    fn depth(&self, id: &str) -> usize {
        self.find(id)
            .map(|t| {
                t.parents
                    .iter()
                    .map(|p| 1 + self.depth(p))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// All types, descendants before their ancestors.
    pub fn list_in_hierarchy_order(&self) -> Vec<Arc<ProjectTypeDef>> {
        let mut all = self.list();
        all.sort_by_key(|t| (Reverse(self.depth(&t.id)), t.id.clone()));
        all
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_type_always_present() {
        let catalog = TypeCatalog::new();
        let base = catalog.get(BASE_TYPE_ID).expect("base");
        assert!(base.primaryable);
        assert!(!base.mixable);
        assert!(base.attributes().is_empty());
    }

    #[test]
    fn unknown_type_is_not_found() {
        let catalog = TypeCatalog::new();
        assert!(matches!(catalog.get("nope"), Err(ProjectError::NotFound(_))));
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let mut catalog = TypeCatalog::new();
        catalog.register(ProjectTypeDef::new("java", "Java")).unwrap();
        let err = catalog.register(ProjectTypeDef::new("java", "Java")).unwrap_err();
        assert!(matches!(err, ProjectError::Conflict(_)));
    }

    #[test]
    fn child_inherits_and_owns_parent_attributes() {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(ProjectTypeDef::new("java", "Java").constant("language", "java"))
            .unwrap();
        catalog
            .register(
                ProjectTypeDef::new("maven", "Maven")
                    .with_parent("java")
                    .variable("maven.artifactId", true),
            )
            .unwrap();
        let maven = catalog.get("maven").unwrap();
        let language = maven.attribute_def("language").expect("inherited");
        assert_eq!(language.project_type, "maven");
        assert_eq!(maven.attributes().len(), 2);
    }

    #[test]
    fn child_redeclaring_parent_attribute_conflicts() {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(ProjectTypeDef::new("java", "Java").variable("language", false))
            .unwrap();
        let err = catalog
            .register(
                ProjectTypeDef::new("maven", "Maven")
                    .with_parent("java")
                    .variable("language", false),
            )
            .unwrap_err();
        assert!(matches!(err, ProjectError::Conflict(_)));
    }

    #[test]
    fn missing_parent_is_not_found() {
        let mut catalog = TypeCatalog::new();
        let err = catalog
            .register(ProjectTypeDef::new("maven", "Maven").with_parent("java"))
            .unwrap_err();
        assert!(matches!(err, ProjectError::NotFound(_)));
    }

    #[test]
    fn hierarchy_order_puts_children_first() {
        let mut catalog = TypeCatalog::new();
        catalog.register(ProjectTypeDef::new("java", "Java")).unwrap();
        catalog
            .register(ProjectTypeDef::new("maven", "Maven").with_parent("java"))
            .unwrap();
        let ids: Vec<String> = catalog
            .list_in_hierarchy_order()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        let maven = ids.iter().position(|i| i == "maven").unwrap();
        let java = ids.iter().position(|i| i == "java").unwrap();
        assert!(maven < java);
    }

    #[test]
    fn only_plain_variables_are_persistable() {
        struct Fixed;
        impl ValueProvider for Fixed {
            fn get_values(
                &self,
                _attribute: &str,
                _folder: &FolderEntry,
            ) -> Result<Option<AttributeValue>, ValueError> {
                Ok(Some(AttributeValue::single("x")))
            }
        }
        let def = ProjectTypeDef::new("t", "T")
            .constant("c", "1")
            .variable("v", false)
            .provided("p", false, Arc::new(Fixed));
        let persistable: Vec<&str> = def
            .attributes()
            .iter()
            .filter(|a| a.is_persistable())
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(persistable, vec!["v"]);
    }
}
