//! Virtual workspace paths.
//!
//! A [`ProjectPath`] is always absolute and normalised: it starts with `/`,
//! has no empty or `.` segments, and `..` can never climb above the root.
//! The registry uses it as its map key, so two spellings of the same folder
//! (`api`, `/api/`, `/x/../api`) always land on the same entry.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectPath(String);

impl ProjectPath {
    /// Absolutize and normalise `raw`.
    pub fn new(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self(format!("/{}", segments.join("/")))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments, root excluded.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment, or `""` for the root.
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    pub fn parent(&self) -> Option<ProjectPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
        }
    }

    pub fn join(&self, relative: &str) -> ProjectPath {
        Self::new(&format!("{}/{}", self.0, relative))
    }

    /// `self` and every ancestor up to (but excluding) the root, nearest first.
    pub fn ancestors(&self) -> Vec<ProjectPath> {
        let mut out = Vec::new();
        let mut current = Some(self.clone());
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            out.push(path);
        }
        out
    }

    /// True when `self` lies strictly below `other`. Segment based: `/ab` is not under `/a`.
    pub fn is_descendant_of(&self, other: &ProjectPath) -> bool {
        if self == other {
            return false;
        }
        if other.is_root() {
            return true;
        }
        self.0.len() > other.0.len()
            && self.0.starts_with(&other.0)
            && self.0.as_bytes()[other.0.len()] == b'/'
    }

    /// `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &ProjectPath) -> bool {
        self == other || self.is_descendant_of(other)
    }

    /// Relative remainder of `self` under `base`, without a leading `/`.
    pub fn relative_to(&self, base: &ProjectPath) -> Option<String> {
        if self == base {
            return Some(String::new());
        }
        if !self.is_descendant_of(base) {
            return None;
        }
        let offset = if base.is_root() { 1 } else { base.0.len() + 1 };
        Some(self.0[offset..].to_string())
    }

    /// Re-root `self` from under `from` to under `to`.
    pub fn rebase(&self, from: &ProjectPath, to: &ProjectPath) -> Option<ProjectPath> {
        self.relative_to(from).map(|rest| to.join(&rest))
    }
}

impl Default for ProjectPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProjectPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProjectPath {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl Serialize for ProjectPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProjectPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}
