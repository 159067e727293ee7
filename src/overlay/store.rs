//! Copy-on-write record store.
//!
//! An [`Overlay`] is a read-only backend plus an append-only log of
//! [`Record`]s. The per-path slot index is derived from the log by folding
//! each record as it is appended and is never written any other way, so
//! replaying the log over the backend always rebuilds the same state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::backend::Backend;
use crate::fs::{Content, TreeError, TreePath, TreeResult};
use crate::overlay::record::{Record, RecordId, RecordKind, TreeId};
use crate::overlay::view::{Snapshot, SyncView};

/// What the log says about one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlotState {
    Present(Content),
    Deleted,
    RenamedTo(TreePath),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) state: SlotState,
    pub(crate) created: bool,
    pub(crate) overwritten: bool,
    /// The most recent record that changed this slot.
    pub(crate) last: RecordId,
}

impl Slot {
    fn with_state(state: SlotState, last: RecordId) -> Self {
        Self { state, created: false, overwritten: false, last }
    }

    pub(crate) fn is_present(&self) -> bool {
        matches!(self.state, SlotState::Present(_))
    }
}

#[derive(Clone)]
pub struct Overlay {
    backend: Arc<dyn Backend>,
    owner: TreeId,
    records: Vec<Record>,
    slots: BTreeMap<TreePath, Slot>,
    known: HashSet<RecordId>,
    next_seq: u64,
    next_serial: u64,
}

impl Overlay {
    pub fn new(backend: Arc<dyn Backend>, owner: TreeId) -> Self {
        Self {
            backend,
            owner,
            records: Vec::new(),
            slots: BTreeMap::new(),
            known: HashSet::new(),
            next_seq: 0,
            next_serial: 0,
        }
    }

    /// Copy of this overlay owned by `owner`. History is shared by value:
    /// later appends to either copy are invisible to the other.
    pub fn fork(&self, owner: TreeId) -> Self {
        Self { owner, next_serial: 0, ..self.clone() }
    }

    pub fn owner(&self) -> TreeId {
        self.owner
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn view(&self) -> SyncView<'_> {
        SyncView::new(self.backend.as_ref(), &self.slots)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(Arc::clone(&self.backend), self.slots.clone())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// True if a record with this identity is already part of the log.
    pub fn knows(&self, id: &RecordId) -> bool {
        self.known.contains(id)
    }

    pub fn exists(&self, path: &TreePath) -> bool {
        self.view().exists(path)
    }

    pub fn is_file(&self, path: &TreePath) -> bool {
        self.view().is_file(path)
    }

    pub fn is_directory(&self, path: &TreePath) -> bool {
        self.view().is_directory(path)
    }

    pub fn read(&self, path: &TreePath) -> Option<Content> {
        self.view().read(path)
    }

    pub fn create(&mut self, path: TreePath, content: Content) -> TreeResult<()> {
        self.record(RecordKind::Create { path, content }, None)
    }

    pub fn overwrite(&mut self, path: TreePath, content: Content) -> TreeResult<()> {
        self.record(RecordKind::Overwrite { path, content }, None)
    }

    pub fn rename(&mut self, from: TreePath, to: TreePath) -> TreeResult<()> {
        self.record(RecordKind::Rename { from, to }, None)
    }

    pub fn delete(&mut self, path: TreePath) -> TreeResult<()> {
        self.record(RecordKind::Delete { path }, None)
    }

    pub fn will_create(&self, path: &TreePath) -> bool {
        self.slots.get(path).is_some_and(|slot| slot.is_present() && slot.created)
    }

    pub fn will_overwrite(&self, path: &TreePath) -> bool {
        self.slots.get(path).is_some_and(|slot| slot.is_present() && slot.overwritten)
    }

    /// True when the log put content at `path`: a create, an overwrite or
    /// the target of a rename.
    pub fn will_hold(&self, path: &TreePath) -> bool {
        self.slots.get(path).is_some_and(Slot::is_present)
    }

    pub fn will_delete(&self, path: &TreePath) -> bool {
        self.slots.get(path).is_some_and(|slot| slot.state == SlotState::Deleted)
    }

    pub fn will_rename(&self, path: &TreePath) -> bool {
        self.slots.get(path).is_some_and(|slot| matches!(slot.state, SlotState::RenamedTo(_)))
    }

    pub fn will_rename_to(&self, from: &TreePath, to: &TreePath) -> bool {
        self.slots
            .get(from)
            .is_some_and(|slot| matches!(&slot.state, SlotState::RenamedTo(target) if target == to))
    }

    /// Identity of the latest record that touched `path`, if any did.
    pub fn last_touch(&self, path: &TreePath) -> Option<RecordId> {
        self.slots.get(path).map(|slot| slot.last)
    }

    /// Validate and append a mutation. A fresh identity owned by this overlay
    /// is allocated unless `id` carries one from another log.
    pub(crate) fn record(&mut self, kind: RecordKind, id: Option<RecordId>) -> TreeResult<()> {
        self.validate(&kind)?;

        let id = id.unwrap_or_else(|| {
            let id = RecordId { origin: self.owner, serial: self.next_serial };
            self.next_serial += 1;
            id
        });
        self.append(kind, id);
        Ok(())
    }

    fn validate(&self, kind: &RecordKind) -> TreeResult<()> {
        let view = self.view();
        match kind {
            RecordKind::Create { path, .. } => {
                if view.exists(path) {
                    return Err(TreeError::FileAlreadyExists(path.clone()));
                }
                if let Some(ancestor) = view.file_ancestor(path) {
                    return Err(TreeError::PathIsFile(ancestor));
                }
            }
            RecordKind::Overwrite { path, .. } | RecordKind::Delete { path } => {
                Self::require_file(&view, path)?;
            }
            RecordKind::Rename { from, to } => {
                Self::require_file(&view, from)?;
                if view.exists(to) {
                    return Err(TreeError::FileAlreadyExists(to.clone()));
                }
                if let Some(ancestor) = view.file_ancestor(to) {
                    return Err(TreeError::PathIsFile(ancestor));
                }
            }
        }
        Ok(())
    }

    fn require_file(view: &SyncView<'_>, path: &TreePath) -> TreeResult<()> {
        if view.is_file(path) {
            Ok(())
        } else if view.is_directory(path) {
            Err(TreeError::PathIsDirectory(path.clone()))
        } else {
            Err(TreeError::FileDoesNotExist(path.clone()))
        }
    }

    fn append(&mut self, kind: RecordKind, id: RecordId) {
        match &kind {
            RecordKind::Create { path, content } => {
                let slot = Slot {
                    state: SlotState::Present(content.clone()),
                    created: true,
                    overwritten: false,
                    last: id,
                };
                self.slots.insert(path.clone(), slot);
            }
            RecordKind::Overwrite { path, content } => {
                let slot = self
                    .slots
                    .entry(path.clone())
                    .or_insert_with(|| Slot::with_state(SlotState::Deleted, id));
                slot.state = SlotState::Present(content.clone());
                slot.overwritten = true;
                slot.last = id;
            }
            RecordKind::Rename { from, to } => {
                let content = self.view().read(from).unwrap_or_default();
                self.slots
                    .insert(from.clone(), Slot::with_state(SlotState::RenamedTo(to.clone()), id));
                self.slots.insert(to.clone(), Slot::with_state(SlotState::Present(content), id));
            }
            RecordKind::Delete { path } => {
                self.slots.insert(path.clone(), Slot::with_state(SlotState::Deleted, id));
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(
            tree = %self.owner,
            seq,
            origin = %id.origin,
            kind = kind.name(),
            path = %kind.path(),
            "Recorded mutation"
        );
        self.known.insert(id);
        self.records.push(Record { seq, id, kind });
    }
}
