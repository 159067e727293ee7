use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fs::{Content, TreePath};

/// Opaque identity of a tree. Survives serialization, unlike pointer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(Uuid);

impl TreeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TreeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one mutation: the tree that first produced it plus that
/// tree's serial number for it. Kept unchanged when a record is copied into
/// a branch or replayed by a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub origin: TreeId,
    pub serial: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordKind {
    Create { path: TreePath, content: Content },
    Overwrite { path: TreePath, content: Content },
    Rename { from: TreePath, to: TreePath },
    Delete { path: TreePath },
}

impl RecordKind {
    /// The path the mutation acts on (the source for a rename).
    pub fn path(&self) -> &TreePath {
        match self {
            RecordKind::Create { path, .. }
            | RecordKind::Overwrite { path, .. }
            | RecordKind::Delete { path } => path,
            RecordKind::Rename { from, .. } => from,
        }
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            RecordKind::Create { content, .. } | RecordKind::Overwrite { content, .. } => {
                Some(content)
            }
            RecordKind::Rename { .. } | RecordKind::Delete { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Create { .. } => "create",
            RecordKind::Overwrite { .. } => "overwrite",
            RecordKind::Rename { .. } => "rename",
            RecordKind::Delete { .. } => "delete",
        }
    }
}

/// One entry of an overlay's append-only log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Position in the owning log; strictly increasing.
    pub seq: u64,
    pub id: RecordId,
    pub kind: RecordKind,
}
