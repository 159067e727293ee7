use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fs::error::{TreeError, TreeResult};

const MAX_PATH_LENGTH: usize = 4096;
const MAX_FILENAME_LENGTH: usize = 255;

/// Normalized absolute path inside a tree.
///
/// Always starts with `/`, never contains `.` or `..` segments, empty segments
/// or a trailing slash (except for the root itself). Equality is plain string
/// equality, so two `TreePath`s address the same entry iff they are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath(String);

/// A single path segment (a file or directory name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathFragment(String);

pub fn normalize_path(path: &str) -> TreeResult<String> {
    if path.is_empty() {
        return Err(TreeError::InvalidPath("Empty path".to_string()));
    }

    if path.contains('\0') {
        return Err(TreeError::InvalidPath("Path contains NULL character".to_string()));
    }

    if path.len() > MAX_PATH_LENGTH {
        return Err(TreeError::PathTooLong(path.len()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(TreeError::InvalidPath(format!("Path escapes root: {path}")));
                }
            }
            name => {
                if name.len() > MAX_FILENAME_LENGTH {
                    return Err(TreeError::FilenameTooLong(name.len()));
                }
                parts.push(name);
            }
        }
    }

    Ok(format!("/{}", parts.join("/")))
}

impl TreePath {
    /// Parse and normalize a path. Relative input is rooted at `/`.
    pub fn parse(raw: &str) -> TreeResult<Self> {
        normalize_path(raw).map(Self)
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

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// The last segment, or `None` for the root.
    pub fn name(&self) -> Option<PathFragment> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next().map(|name| PathFragment(name.to_string()))
    }

    /// Resolve `child` (which may itself contain slashes) below this path.
    pub fn join(&self, child: &str) -> TreeResult<TreePath> {
        Self::parse(&format!("{}/{}", self.0, child))
    }

    pub(crate) fn child(&self, fragment: &PathFragment) -> TreePath {
        if self.is_root() {
            Self(format!("/{}", fragment.0))
        } else {
            Self(format!("{}/{}", self.0, fragment.0))
        }
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// True if `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &TreePath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// For a path strictly below `self`, the name of the direct child of
    /// `self` that leads to it.
    pub(crate) fn first_component_below(&self, descendant: &TreePath) -> Option<PathFragment> {
        if !self.is_ancestor_of(descendant) {
            return None;
        }
        let rest = if self.is_root() { &descendant.0[1..] } else { &descendant.0[self.0.len() + 1..] };
        rest.split('/').next().map(|name| PathFragment(name.to_string()))
    }

    /// Every descendant's string form starts with this prefix.
    pub(crate) fn descendant_prefix(&self) -> String {
        if self.is_root() { "/".to_string() } else { format!("{}/", self.0) }
    }

    /// Proper ancestors from the direct parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = TreePath> {
        std::iter::successors(self.parent(), |p| p.parent())
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TreePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TreePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TreePath {
    type Error = TreeError;

    fn try_from(raw: String) -> TreeResult<Self> {
        Self::parse(&raw)
    }
}

impl TryFrom<&str> for TreePath {
    type Error = TreeError;

    fn try_from(raw: &str) -> TreeResult<Self> {
        Self::parse(raw)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.0
    }
}

impl PathFragment {
    pub fn new(name: impl Into<String>) -> TreeResult<Self> {
        let name = name.into();
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(TreeError::InvalidPath(format!("Invalid path fragment: {name:?}")));
        }
        if name.len() > MAX_FILENAME_LENGTH {
            return Err(TreeError::FilenameTooLong(name.len()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
