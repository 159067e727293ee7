//! Exported form of a tree's log and the sinks that consume it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use tracing::debug;

use crate::backend::Backend;
use crate::fs::{Content, TreeError, TreePath, TreeResult};
use crate::overlay::{Record, RecordKind, TreeId};

/// One mutation as handed to an external sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Tree that originally produced the mutation.
    pub id: TreeId,
    /// Reserved for nested-merge provenance; always `None`.
    pub parent: Option<TreeId>,
    pub seq: u64,
    #[serde(flatten)]
    pub kind: RecordKind,
}

impl Action {
    pub fn path(&self) -> &TreePath {
        self.kind.path()
    }
}

impl From<&Record> for Action {
    fn from(record: &Record) -> Self {
        Self { id: record.id.origin, parent: None, seq: record.seq, kind: record.kind.clone() }
    }
}

/// Consumer of exported actions, e.g. something that writes them to disk.
pub trait ActionSink {
    fn apply(&mut self, action: &Action) -> TreeResult<()>;
}

/// Feed `actions` to `sink` in order, stopping at the first error.
pub fn replay<'a, S>(actions: impl IntoIterator<Item = &'a Action>, sink: &mut S) -> TreeResult<()>
where
    S: ActionSink + ?Sized,
{
    actions.into_iter().try_for_each(|action| sink.apply(action))
}

/// Map `records` to actions, leaving out those whose effect cancels:
/// - every record of a file that was created in the log and later deleted,
///   following it through renames
/// - overwrites that leave the content as it was
pub(crate) fn export(records: &[Record], backend: &dyn Backend) -> Vec<Action> {
    let mut state = Shadow::new(backend);
    // Current path of each file created in the log -> its lineage.
    let mut lineage_at: HashMap<TreePath, usize> = HashMap::new();
    let mut dead = vec![];
    let mut lineage_of: Vec<Option<usize>> = Vec::with_capacity(records.len());
    let mut identical = vec![false; records.len()];
    let mut lineages = 0usize;

    for (index, record) in records.iter().enumerate() {
        let lineage = match &record.kind {
            RecordKind::Create { path, content } => {
                let lineage = lineages;
                lineages += 1;
                dead.push(false);
                lineage_at.insert(path.clone(), lineage);
                state.set(path, content.clone());
                Some(lineage)
            }
            RecordKind::Overwrite { path, content } => {
                identical[index] = state.get(path).as_ref() == Some(content);
                state.set(path, content.clone());
                lineage_at.get(path).copied()
            }
            RecordKind::Rename { from, to } => {
                state.rename(from, to);
                let lineage = lineage_at.remove(from);
                if let Some(lineage) = lineage {
                    lineage_at.insert(to.clone(), lineage);
                }
                lineage
            }
            RecordKind::Delete { path } => {
                state.remove(path);
                let lineage = lineage_at.remove(path);
                if let Some(lineage) = lineage {
                    dead[lineage] = true;
                }
                lineage
            }
        };
        lineage_of.push(lineage);
    }

    let actions: Vec<Action> = records
        .iter()
        .zip(lineage_of)
        .zip(identical)
        .filter(|((_, lineage), identical)| !identical && !lineage.is_some_and(|l| dead[l]))
        .map(|((record, _), _)| Action::from(record))
        .collect();
    debug!(records = records.len(), actions = actions.len(), "Exported actions");
    actions
}

/// Path-to-content state layered over a backend, as a sink would see it
/// after applying a prefix of the actions.
struct Shadow<'a> {
    backend: &'a dyn Backend,
    files: HashMap<TreePath, Option<Content>>,
}

impl<'a> Shadow<'a> {
    fn new(backend: &'a dyn Backend) -> Self {
        Self { backend, files: HashMap::new() }
    }

    fn get(&self, path: &TreePath) -> Option<Content> {
        match self.files.get(path) {
            Some(entry) => entry.clone(),
            None => self.backend.read(path),
        }
    }

    fn set(&mut self, path: &TreePath, content: Content) {
        self.files.insert(path.clone(), Some(content));
    }

    fn remove(&mut self, path: &TreePath) {
        self.files.insert(path.clone(), None);
    }

    fn rename(&mut self, from: &TreePath, to: &TreePath) {
        let content = self.get(from).unwrap_or_default();
        self.remove(from);
        self.set(to, content);
    }
}

/// Sink that applies nothing and describes what would happen, one line per
/// action.
pub struct DryRunSink {
    backend: Arc<dyn Backend>,
    files: HashMap<TreePath, Option<Content>>,
    lines: Vec<String>,
}

impl DryRunSink {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend, files: HashMap::new(), lines: Vec::new() }
    }

    pub fn report(&self) -> &[String] {
        &self.lines
    }

    pub fn into_report(self) -> Vec<String> {
        self.lines
    }

    fn current(&self, path: &TreePath) -> Option<Content> {
        match self.files.get(path) {
            Some(entry) => entry.clone(),
            None => self.backend.read(path),
        }
    }

    fn require(&self, path: &TreePath) -> TreeResult<Content> {
        self.current(path).ok_or_else(|| TreeError::FileDoesNotExist(path.clone()))
    }
}

impl ActionSink for DryRunSink {
    fn apply(&mut self, action: &Action) -> TreeResult<()> {
        let line = match &action.kind {
            RecordKind::Create { path, content } => {
                if self.current(path).is_some() {
                    return Err(TreeError::FileAlreadyExists(path.clone()));
                }
                self.files.insert(path.clone(), Some(content.clone()));
                format!("CREATE {path} ({} bytes)", content.len())
            }
            RecordKind::Overwrite { path, content } => {
                let before = self.require(path)?;
                let (added, deleted) = line_changes(&before, content);
                self.files.insert(path.clone(), Some(content.clone()));
                format!("UPDATE {path} ({} bytes, +{added} -{deleted} lines)", content.len())
            }
            RecordKind::Rename { from, to } => {
                let content = self.require(from)?;
                if self.current(to).is_some() {
                    return Err(TreeError::FileAlreadyExists(to.clone()));
                }
                self.files.insert(from.clone(), None);
                self.files.insert(to.clone(), Some(content));
                format!("RENAME {from} => {to}")
            }
            RecordKind::Delete { path } => {
                self.require(path)?;
                self.files.insert(path.clone(), None);
                format!("DELETE {path}")
            }
        };
        self.lines.push(line);
        Ok(())
    }
}

fn line_changes(before: &Content, after: &Content) -> (usize, usize) {
    let before = before.to_string_lossy();
    let after = after.to_string_lossy();
    let diff = TextDiff::from_lines(before.as_str(), after.as_str());

    let mut added = 0;
    let mut deleted = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => deleted += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, deleted)
}
