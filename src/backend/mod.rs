//! Read-only backends a tree is layered over.
//!
//! A backend is a synchronous capability: every call answers immediately.
//! Anything that needs asynchronous work to produce the data (such as
//! [`host::capture`]) must finish before a tree is built on top of it.

pub mod host;
pub mod memory;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use crate::fs::{Content, PathFragment, TreePath};

pub use host::capture;
pub use memory::MemoryBackend;

#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait Backend: Send + Sync {
    fn is_file(&self, path: &TreePath) -> bool;

    fn is_directory(&self, path: &TreePath) -> bool;

    fn read(&self, path: &TreePath) -> Option<Content>;

    /// Names of the direct children of `path`. Empty when `path` is not a
    /// directory.
    fn list(&self, path: &TreePath) -> Vec<PathFragment>;

    fn exists(&self, path: &TreePath) -> bool {
        self.is_file(path) || self.is_directory(path)
    }
}

/// Backend with nothing in it but the root directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBackend;

impl Backend for EmptyBackend {
    fn is_file(&self, _path: &TreePath) -> bool {
        false
    }

    fn is_directory(&self, path: &TreePath) -> bool {
        path.is_root()
    }

    fn read(&self, _path: &TreePath) -> Option<Content> {
        None
    }

    fn list(&self, _path: &TreePath) -> Vec<PathFragment> {
        Vec::new()
    }
}
