//! Lazily computed directory and file views.
//!
//! Entries borrow their tree, so the state they describe cannot change while
//! they are alive. Directory listings are cached per tree and dropped along
//! the path chain whenever a structural mutation touches them.

use std::cell::OnceCell;
use std::fmt;

use crate::fs::{Content, PathFragment, TreeError, TreePath, TreeResult};
use crate::overlay::Overlay;
use crate::tree::virtual_tree::Tree;

/// Children of one directory, split by kind, in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    pub subdirs: Vec<PathFragment>,
    pub subfiles: Vec<PathFragment>,
}

impl DirListing {
    pub(crate) fn compute(overlay: &Overlay, path: &TreePath) -> Self {
        let view = overlay.view();
        let mut listing = Self::default();
        for name in view.list(path) {
            if view.is_file(&path.child(&name)) {
                listing.subfiles.push(name);
            } else {
                listing.subdirs.push(name);
            }
        }
        listing
    }
}

#[derive(Clone)]
pub struct DirEntry<'a> {
    tree: &'a Tree,
    path: TreePath,
}

impl<'a> DirEntry<'a> {
    pub(crate) fn new(tree: &'a Tree, path: TreePath) -> Self {
        Self { tree, path }
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    pub fn parent(&self) -> Option<DirEntry<'a>> {
        self.path.parent().map(|parent| DirEntry::new(self.tree, parent))
    }

    pub fn subdirs(&self) -> Vec<PathFragment> {
        self.tree.listing(&self.path).subdirs.clone()
    }

    pub fn subfiles(&self) -> Vec<PathFragment> {
        self.tree.listing(&self.path).subfiles.clone()
    }

    pub fn dir(&self, name: &PathFragment) -> DirEntry<'a> {
        DirEntry::new(self.tree, self.path.child(name))
    }

    pub fn file(&self, name: &PathFragment) -> Option<FileEntry<'a>> {
        let path = self.path.child(name);
        self.tree.overlay.is_file(&path).then(|| FileEntry::new(self.tree, path))
    }

    /// Visit every file below this directory: all files of a directory
    /// first, then each subdirectory recursively, siblings in sorted order.
    ///
    /// Returning [`TreeError::VisitCancelled`] from the visitor stops the
    /// walk and is not reported to the caller; any other error is.
    pub fn visit<F>(&self, mut visitor: F) -> TreeResult<()>
    where
        F: FnMut(&FileEntry<'a>) -> TreeResult<()>,
    {
        match self.walk(&mut visitor) {
            Err(TreeError::VisitCancelled) => Ok(()),
            other => other,
        }
    }

    fn walk<F>(&self, visitor: &mut F) -> TreeResult<()>
    where
        F: FnMut(&FileEntry<'a>) -> TreeResult<()>,
    {
        let listing = self.tree.listing(&self.path);
        for name in &listing.subfiles {
            if let Some(file) = self.file(name) {
                visitor(&file)?;
            }
        }
        for name in &listing.subdirs {
            self.dir(name).walk(visitor)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DirEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry").field("path", &self.path).finish()
    }
}

/// A file in a tree. Content is read on first access.
pub struct FileEntry<'a> {
    tree: &'a Tree,
    path: TreePath,
    content: OnceCell<Content>,
}

impl<'a> FileEntry<'a> {
    pub(crate) fn new(tree: &'a Tree, path: TreePath) -> Self {
        Self { tree, path, content: OnceCell::new() }
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    pub fn content(&self) -> &Content {
        self.content.get_or_init(|| self.tree.overlay.read(&self.path).unwrap_or_default())
    }

    pub fn is_loaded(&self) -> bool {
        self.content.get().is_some()
    }
}

impl fmt::Debug for FileEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEntry").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn tree_with(files: &[(&str, &str)]) -> Tree {
        Tree::new(MemoryBackend::from_files(files.iter().copied()).unwrap())
    }

    fn visited(tree: &Tree) -> Vec<String> {
        let mut paths = Vec::new();
        tree.visit(|file| {
            paths.push(file.path().to_string());
            Ok(())
        })
        .unwrap();
        paths
    }

    #[test]
    fn test_listing_splits_files_and_dirs() {
        let tree = tree_with(&[("/a", "1"), ("/dir/b", "2"), ("/dir/sub/c", "3")]);
        let dir = tree.get_dir("/dir").unwrap();
        assert_eq!(dir.subfiles(), vec![PathFragment::new("b").unwrap()]);
        assert_eq!(dir.subdirs(), vec![PathFragment::new("sub").unwrap()]);
        assert_eq!(dir.parent().unwrap().path(), &TreePath::root());
    }

    #[test]
    fn test_visit_files_before_subdirectories() {
        let tree = tree_with(&[("/dir/b", "2"), ("/a", "1"), ("/z", "3"), ("/dir/x/y", "4")]);
        assert_eq!(visited(&tree), vec!["/a", "/z", "/dir/b", "/dir/x/y"]);
    }

    #[test]
    fn test_visit_cancellation_is_swallowed() {
        let tree = tree_with(&[("/a", "1"), ("/dir/b", "2")]);
        let mut seen = Vec::new();
        let result = tree.visit(|file| {
            seen.push(file.path().to_string());
            Err(TreeError::VisitCancelled)
        });
        assert!(result.is_ok());
        assert_eq!(seen, vec!["/a"]);
    }

    #[test]
    fn test_visit_propagates_other_errors() {
        let tree = tree_with(&[("/a", "1")]);
        let result = tree.visit(|file| Err(TreeError::FileDoesNotExist(file.path().clone())));
        assert_eq!(result, Err(TreeError::FileDoesNotExist(TreePath::parse("/a").unwrap())));
    }

    #[test]
    fn test_file_content_is_lazy() {
        let tree = tree_with(&[("/a", "1")]);
        let file = tree.get("/a").unwrap();
        assert!(!file.is_loaded());
        assert_eq!(file.content(), &Content::from("1"));
        assert!(file.is_loaded());
    }

    #[test]
    fn test_visit_sees_overlay_changes() {
        let mut tree = tree_with(&[("/a", "1"), ("/dir/b", "2")]);
        tree.delete("/dir/b").unwrap();
        tree.create("/new/c", "3").unwrap();
        assert_eq!(visited(&tree), vec!["/a", "/new/c"]);
    }
}
