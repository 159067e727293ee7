use thiserror::Error;

use crate::fs::path::TreePath;

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("File already exists: {0}")]
    FileAlreadyExists(TreePath),

    #[error("File does not exist: {0}")]
    FileDoesNotExist(TreePath),

    #[error("Path is a directory: {0}")]
    PathIsDirectory(TreePath),

    #[error("Path is a file: {0}")]
    PathIsFile(TreePath),

    #[error("Merge conflict on path: {0}")]
    MergeConflict(TreePath),

    #[error("Invalid update record: {0}")]
    InvalidUpdateRecord(String),

    #[error("Content at {0} has mutated since the update began")]
    ContentHasMutated(TreePath),

    #[error("This tree does not accept actions; mutate it directly")]
    ApplyNotSupported,

    #[error("Visit cancelled")]
    VisitCancelled,

    #[error("Unknown merge strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path too long: {0} bytes (max 4096)")]
    PathTooLong(usize),

    #[error("Filename too long: {0} bytes (max 255)")]
    FilenameTooLong(usize),
}
