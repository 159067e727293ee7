use std::fmt;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::debug;

use crate::backend::{Backend, EmptyBackend};
use crate::fs::{Content, TreeError, TreePath, TreeResult};
use crate::overlay::{Overlay, Record, Snapshot, TreeId};
use crate::tree::action::{self, Action, ActionSink};
use crate::tree::entry::{DirEntry, DirListing, FileEntry};
use crate::tree::merge::MergeStrategy;
use crate::update::UpdateRecorder;

/// Runtime settings a tree carries and hands down to its branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    /// Maximum number of cached directory listings.
    pub cache_capacity: u64,
    /// Strategy used by [`Tree::merge_default`].
    pub default_strategy: MergeStrategy,
    /// Reject `commit_update` when the file changed after `begin_update`.
    pub verify_base_content: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            default_strategy: MergeStrategy::DEFAULT,
            verify_base_content: false,
        }
    }
}

/// Transactional virtual filesystem.
///
/// All structural changes are appended to the tree's overlay log; nothing
/// reaches the backend. Branches are isolated copies that can later be merged
/// back, and [`Tree::actions`] exports the log for an external sink.
pub struct Tree {
    id: TreeId,
    pub(crate) overlay: Overlay,
    dirs: Cache<TreePath, Arc<DirListing>>,
    options: TreeOptions,
}

impl Tree {
    /// Tree over a backend holding nothing but the root directory.
    pub fn empty() -> Self {
        Self::new(EmptyBackend)
    }

    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self::with_options(Arc::new(backend), TreeOptions::default())
    }

    pub fn with_options(backend: Arc<dyn Backend>, options: TreeOptions) -> Self {
        let id = TreeId::new();
        debug!(tree = %id, "Created tree");
        Self {
            id,
            overlay: Overlay::new(backend, id),
            dirs: Cache::new(options.cache_capacity),
            options,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn records(&self) -> &[Record] {
        self.overlay.records()
    }

    /// Fork an isolated copy of the current state. The branch starts with
    /// this tree's history, so its actions remain a complete log.
    pub fn branch(&self) -> Tree {
        let id = TreeId::new();
        debug!(tree = %self.id, branch = %id, records = self.records().len(), "Branched tree");
        Tree {
            id,
            overlay: self.overlay.fork(id),
            dirs: Cache::new(self.options.cache_capacity),
            options: self.options.clone(),
        }
    }

    /// Freeze the current resolved state as a read-only backend.
    pub fn snapshot(&self) -> Snapshot {
        self.overlay.snapshot()
    }

    pub fn exists(&self, path: impl AsRef<str>) -> bool {
        TreePath::parse(path.as_ref()).is_ok_and(|path| self.overlay.exists(&path))
    }

    pub fn is_file(&self, path: impl AsRef<str>) -> bool {
        TreePath::parse(path.as_ref()).is_ok_and(|path| self.overlay.is_file(&path))
    }

    pub fn is_directory(&self, path: impl AsRef<str>) -> bool {
        TreePath::parse(path.as_ref()).is_ok_and(|path| self.overlay.is_directory(&path))
    }

    pub fn read(&self, path: impl AsRef<str>) -> Option<Content> {
        TreePath::parse(path.as_ref()).ok().and_then(|path| self.overlay.read(&path))
    }

    pub fn read_to_string(&self, path: impl AsRef<str>) -> Option<String> {
        self.read(path).map(|content| content.to_string_lossy())
    }

    pub fn get(&self, path: impl AsRef<str>) -> Option<FileEntry<'_>> {
        let path = TreePath::parse(path.as_ref()).ok()?;
        self.overlay.is_file(&path).then(|| FileEntry::new(self, path))
    }

    pub fn get_dir(&self, path: impl AsRef<str>) -> TreeResult<DirEntry<'_>> {
        Ok(DirEntry::new(self, TreePath::parse(path.as_ref())?))
    }

    pub fn root(&self) -> DirEntry<'_> {
        DirEntry::new(self, TreePath::root())
    }

    /// Depth-first walk over every file; see [`DirEntry::visit`].
    pub fn visit<F>(&self, visitor: F) -> TreeResult<()>
    where
        F: FnMut(&FileEntry<'_>) -> TreeResult<()>,
    {
        self.root().visit(visitor)
    }

    pub fn create(&mut self, path: impl AsRef<str>, content: impl Into<Content>) -> TreeResult<()> {
        let path = TreePath::parse(path.as_ref())?;
        self.overlay.create(path.clone(), content.into())?;
        self.invalidate(&path);
        Ok(())
    }

    pub fn overwrite(
        &mut self,
        path: impl AsRef<str>,
        content: impl Into<Content>,
    ) -> TreeResult<()> {
        let path = TreePath::parse(path.as_ref())?;
        self.overlay.overwrite(path, content.into())
    }

    pub fn rename(&mut self, from: impl AsRef<str>, to: impl AsRef<str>) -> TreeResult<()> {
        let from = TreePath::parse(from.as_ref())?;
        let to = TreePath::parse(to.as_ref())?;
        self.overlay.rename(from.clone(), to.clone())?;
        self.invalidate(&from);
        self.invalidate(&to);
        Ok(())
    }

    pub fn delete(&mut self, path: impl AsRef<str>) -> TreeResult<()> {
        let path = TreePath::parse(path.as_ref())?;
        self.overlay.delete(path.clone())?;
        self.invalidate(&path);
        Ok(())
    }

    /// Open a recorder for positional edits to the file at `path`.
    pub fn begin_update(&self, path: impl AsRef<str>) -> TreeResult<UpdateRecorder> {
        let path = TreePath::parse(path.as_ref())?;
        if self.overlay.is_directory(&path) {
            return Err(TreeError::PathIsDirectory(path));
        }
        let content =
            self.overlay.read(&path).ok_or_else(|| TreeError::FileDoesNotExist(path.clone()))?;
        Ok(UpdateRecorder::new(path, self.id, &content))
    }

    /// Apply a recorder's patches to the file's current content and record
    /// the result as an overwrite.
    pub fn commit_update(&mut self, recorder: UpdateRecorder) -> TreeResult<()> {
        if recorder.tree_id() != self.id {
            return Err(TreeError::InvalidUpdateRecord(format!(
                "recorder for {} was opened on tree {}, not {}",
                recorder.path(),
                recorder.tree_id(),
                self.id
            )));
        }

        let path = recorder.path().clone();
        let current =
            self.overlay.read(&path).ok_or_else(|| TreeError::ContentHasMutated(path.clone()))?;
        if self.options.verify_base_content && current.digest() != *recorder.base_digest() {
            return Err(TreeError::ContentHasMutated(path));
        }

        let updated = recorder.apply(&current)?;
        debug!(
            tree = %self.id,
            path = %path,
            patches = recorder.ops().len(),
            before = current.len(),
            after = updated.len(),
            "Committed update"
        );
        self.overlay.overwrite(path, updated)
    }

    /// The log in externally consumable form, without records whose effect
    /// cancels out.
    pub fn actions(&self) -> Vec<Action> {
        action::export(self.overlay.records(), self.overlay.backend().as_ref())
    }

    pub(crate) fn listing(&self, path: &TreePath) -> Arc<DirListing> {
        self.dirs.get_with(path.clone(), || Arc::new(DirListing::compute(&self.overlay, path)))
    }

    pub(crate) fn invalidate(&self, path: &TreePath) {
        self.dirs.invalidate(path);
        for ancestor in path.ancestors() {
            self.dirs.invalidate(&ancestor);
        }
    }

    pub(crate) fn invalidate_all(&self) {
        self.dirs.invalidate_all();
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.id)
            .field("records", &self.overlay.records().len())
            .finish()
    }
}

impl ActionSink for Tree {
    /// Trees are mutated through their own API; replaying exported actions
    /// is a sink's job.
    fn apply(&mut self, _action: &Action) -> TreeResult<()> {
        Err(TreeError::ApplyNotSupported)
    }
}
