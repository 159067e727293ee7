//! Synchronous view over an overlay's index and its backend.
//!
//! Every existence, listing and read query in the crate goes through
//! [`SyncView`]; it is the only place that knows how overlay slots shadow the
//! backend.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use crate::backend::Backend;
use crate::fs::{Content, PathFragment, TreePath};
use crate::overlay::store::{Slot, SlotState};

#[derive(Clone, Copy)]
pub struct SyncView<'a> {
    backend: &'a dyn Backend,
    slots: &'a BTreeMap<TreePath, Slot>,
}

impl<'a> SyncView<'a> {
    pub(crate) fn new(backend: &'a dyn Backend, slots: &'a BTreeMap<TreePath, Slot>) -> Self {
        Self { backend, slots }
    }

    pub fn is_file(&self, path: &TreePath) -> bool {
        match self.slots.get(path) {
            Some(slot) => slot.is_present(),
            None => self.backend.is_file(path),
        }
    }

    pub fn is_directory(&self, path: &TreePath) -> bool {
        if path.is_root() {
            return true;
        }
        if self.is_file(path) {
            return false;
        }
        if self.slots_below(path).any(|(_, slot)| slot.is_present()) {
            return true;
        }
        if !self.slots_below(path).any(|(_, slot)| !slot.is_present()) {
            return self.backend.is_directory(path);
        }
        self.backend_has_live_file(path)
    }

    pub fn exists(&self, path: &TreePath) -> bool {
        self.is_file(path) || self.is_directory(path)
    }

    pub fn read(&self, path: &TreePath) -> Option<Content> {
        match self.slots.get(path) {
            Some(Slot { state: SlotState::Present(content), .. }) => Some(content.clone()),
            Some(_) => None,
            None => self.backend.read(path),
        }
    }

    /// Sorted names of the live direct children of `path`.
    pub fn list(&self, path: &TreePath) -> Vec<PathFragment> {
        if !self.is_directory(path) {
            return Vec::new();
        }

        let mut names: BTreeSet<PathFragment> = self
            .slots_below(path)
            .filter(|(_, slot)| slot.is_present())
            .filter_map(|(child, _)| path.first_component_below(child))
            .collect();

        for name in self.backend.list(path) {
            if names.contains(&name) {
                continue;
            }
            let child = path.child(&name);
            if self.exists(&child) {
                names.insert(name);
            }
        }

        names.into_iter().collect()
    }

    /// The nearest proper ancestor of `path` that resolves to a file.
    pub fn file_ancestor(&self, path: &TreePath) -> Option<TreePath> {
        path.ancestors().find(|ancestor| self.is_file(ancestor))
    }

    fn slots_below(&self, dir: &TreePath) -> impl Iterator<Item = (&'a TreePath, &'a Slot)> + 'a {
        let prefix = dir.descendant_prefix();
        self.slots
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(move |(path, _)| path.as_str().starts_with(&prefix))
    }

    fn backend_has_live_file(&self, dir: &TreePath) -> bool {
        self.backend.list(dir).into_iter().any(|name| {
            let child = dir.child(&name);
            if self.backend.is_file(&child) {
                !self.slots.contains_key(&child)
            } else {
                self.backend.is_directory(&child) && self.backend_has_live_file(&child)
            }
        })
    }
}

/// Frozen resolved state of an overlay, usable as another tree's backend.
#[derive(Clone)]
pub struct Snapshot {
    backend: Arc<dyn Backend>,
    slots: Arc<BTreeMap<TreePath, Slot>>,
}

impl Snapshot {
    pub(crate) fn new(backend: Arc<dyn Backend>, slots: BTreeMap<TreePath, Slot>) -> Self {
        Self { backend, slots: Arc::new(slots) }
    }

    fn view(&self) -> SyncView<'_> {
        SyncView::new(self.backend.as_ref(), &self.slots)
    }
}

impl Backend for Snapshot {
    fn is_file(&self, path: &TreePath) -> bool {
        self.view().is_file(path)
    }

    fn is_directory(&self, path: &TreePath) -> bool {
        self.view().is_directory(path)
    }

    fn read(&self, path: &TreePath) -> Option<Content> {
        self.view().read(path)
    }

    fn list(&self, path: &TreePath) -> Vec<PathFragment> {
        self.view().list(path)
    }
}
