use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::backend::Backend;
use crate::fs::{Content, PathFragment, TreeError, TreePath, TreeResult};

/// Backend holding files in an ordered in-memory map.
///
/// Directories are implicit: a path is a directory when some file lives
/// below it. The root is always a directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    files: BTreeMap<TreePath, Content>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> TreeResult<Self>
    where
        P: AsRef<str>,
        C: Into<Content>,
    {
        let mut backend = Self::new();
        for (path, content) in files {
            backend.insert(TreePath::parse(path.as_ref())?, content.into())?;
        }
        Ok(backend)
    }

    /// Add or replace a file, keeping the file/directory split consistent.
    pub fn insert(&mut self, path: TreePath, content: Content) -> TreeResult<()> {
        if path.is_root() || self.is_directory(&path) {
            return Err(TreeError::PathIsDirectory(path));
        }
        if let Some(ancestor) = path.ancestors().find(|a| self.files.contains_key(a)) {
            return Err(TreeError::PathIsFile(ancestor));
        }
        self.files.insert(path, content);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = (&TreePath, &Content)> {
        self.files.iter()
    }

    fn descendants<'a>(&'a self, dir: &TreePath) -> impl Iterator<Item = &'a TreePath> + 'a {
        let prefix = dir.descendant_prefix();
        self.files
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .map(|(path, _)| path)
            .take_while(move |path| path.as_str().starts_with(&prefix))
    }
}

impl Backend for MemoryBackend {
    fn is_file(&self, path: &TreePath) -> bool {
        self.files.contains_key(path)
    }

    fn is_directory(&self, path: &TreePath) -> bool {
        path.is_root() || self.descendants(path).next().is_some()
    }

    fn read(&self, path: &TreePath) -> Option<Content> {
        self.files.get(path).cloned()
    }

    fn list(&self, path: &TreePath) -> Vec<PathFragment> {
        let names: BTreeSet<PathFragment> =
            self.descendants(path).filter_map(|child| path.first_component_below(child)).collect();
        names.into_iter().collect()
    }
}
