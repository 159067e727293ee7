//! Reconciling one tree's log into another.
//!
//! Records of the source are replayed in order against the destination.
//! Records the destination already has (same [`RecordId`]) or produced itself
//! are skipped. For the rest, a path only counts as conflicting when the
//! destination changed it in a way the source never saw; the
//! [`MergeStrategy`] decides which of those conflicts may be resolved by
//! letting the source win.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fs::{TreeError, TreePath, TreeResult};
use crate::overlay::{Record, RecordId, RecordKind};
use crate::tree::virtual_tree::Tree;

/// Bit flags controlling which merge conflicts are resolved automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MergeStrategy(u8);

const FLAG_NAMES: [(MergeStrategy, &str); 3] = [
    (MergeStrategy::ALLOW_OVERWRITE_CONFLICT, "allow-overwrite-conflict"),
    (MergeStrategy::ALLOW_CREATION_CONFLICT, "allow-creation-conflict"),
    (MergeStrategy::ALLOW_DELETE_CONFLICT, "allow-delete-conflict"),
];

impl MergeStrategy {
    /// No conflicts allowed.
    pub const DEFAULT: Self = Self(0);
    pub const ALLOW_OVERWRITE_CONFLICT: Self = Self(1 << 1);
    pub const ALLOW_CREATION_CONFLICT: Self = Self(1 << 2);
    pub const ALLOW_DELETE_CONFLICT: Self = Self(1 << 3);
    /// Only content changes may be forced through.
    pub const CONTENT_ONLY: Self = Self::ALLOW_OVERWRITE_CONFLICT;
    /// The source wins every conflict a strategy can resolve.
    pub const OVERWRITE: Self = Self(
        Self::ALLOW_OVERWRITE_CONFLICT.0
            | Self::ALLOW_CREATION_CONFLICT.0
            | Self::ALLOW_DELETE_CONFLICT.0,
    );

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn allows_overwrite_conflict(self) -> bool {
        self.contains(Self::ALLOW_OVERWRITE_CONFLICT)
    }

    pub fn allows_creation_conflict(self) -> bool {
        self.contains(Self::ALLOW_CREATION_CONFLICT)
    }

    pub fn allows_delete_conflict(self) -> bool {
        self.contains(Self::ALLOW_DELETE_CONFLICT)
    }
}

impl BitOr for MergeStrategy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MergeStrategy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::DEFAULT {
            return f.write_str("default");
        }
        if *self == Self::OVERWRITE {
            return f.write_str("overwrite");
        }
        let names: Vec<&str> = FLAG_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

impl FromStr for MergeStrategy {
    type Err = TreeError;

    /// Accepts a preset (`default`, `overwrite`, `content-only`) or flag
    /// names joined with `|` or `,`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut strategy = Self::DEFAULT;
        for part in raw.split(['|', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            strategy |= match part {
                "default" => Self::DEFAULT,
                "overwrite" => Self::OVERWRITE,
                "content-only" => Self::CONTENT_ONLY,
                name => FLAG_NAMES
                    .iter()
                    .find(|(_, flag_name)| *flag_name == name)
                    .map(|(flag, _)| *flag)
                    .ok_or_else(|| TreeError::UnknownStrategy(name.to_string()))?,
            };
        }
        Ok(strategy)
    }
}

impl TryFrom<String> for MergeStrategy {
    type Error = TreeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<MergeStrategy> for String {
    fn from(strategy: MergeStrategy) -> Self {
        strategy.to_string()
    }
}

enum Outcome {
    Applied,
    Identical,
}

impl Tree {
    /// Replay `other`'s log into this tree.
    ///
    /// Stops at the first unresolved conflict with
    /// [`TreeError::MergeConflict`]. Records replayed before that point stay
    /// applied; callers discard the destination on failure.
    pub fn merge(&mut self, other: &Tree, strategy: MergeStrategy) -> TreeResult<()> {
        if other.id() == self.id() {
            return Ok(());
        }

        let mut applied = 0usize;
        let mut skipped = 0usize;
        let result = other.records().iter().try_for_each(|record| {
            if record.id.origin == self.id() || self.overlay.knows(&record.id) {
                skipped += 1;
                return Ok(());
            }
            match self.merge_record(other, record, strategy)? {
                Outcome::Applied => applied += 1,
                Outcome::Identical => skipped += 1,
            }
            Ok(())
        });
        self.invalidate_all();

        match &result {
            Ok(()) => info!(
                tree = %self.id(),
                source = %other.id(),
                %strategy,
                applied,
                skipped,
                "Merged tree"
            ),
            Err(err) => warn!(
                tree = %self.id(),
                source = %other.id(),
                %strategy,
                applied,
                error = %err,
                "Merge aborted"
            ),
        }
        result
    }

    /// [`Tree::merge`] with the strategy from this tree's options.
    pub fn merge_default(&mut self, other: &Tree) -> TreeResult<()> {
        let strategy = self.options().default_strategy;
        self.merge(other, strategy)
    }

    fn merge_record(
        &mut self,
        other: &Tree,
        record: &Record,
        strategy: MergeStrategy,
    ) -> TreeResult<Outcome> {
        let id = Some(record.id);
        match &record.kind {
            RecordKind::Create { path, content } => {
                if self.blocked(path) {
                    return Err(conflict(path));
                }
                if self.overlay.is_file(path) {
                    if self.overlay.read(path).as_ref() == Some(content) {
                        return Ok(Outcome::Identical);
                    }
                    if !strategy.allows_creation_conflict() {
                        return Err(conflict(path));
                    }
                    let kind = RecordKind::Overwrite { path: path.clone(), content: content.clone() };
                    self.overlay.record(kind, id)?;
                } else {
                    self.overlay.record(record.kind.clone(), id)?;
                }
            }
            RecordKind::Overwrite { path, content } => {
                if self.overlay.is_file(path) {
                    if self.changed_here(other, path) {
                        if self.overlay.read(path).as_ref() == Some(content) {
                            return Ok(Outcome::Identical);
                        }
                        if !strategy.allows_overwrite_conflict() {
                            return Err(conflict(path));
                        }
                    }
                    self.overlay.record(record.kind.clone(), id)?;
                } else {
                    // Gone here, or never existed: only forced writes recreate it.
                    if self.blocked(path) || !strategy.allows_overwrite_conflict() {
                        return Err(conflict(path));
                    }
                    let kind = RecordKind::Create { path: path.clone(), content: content.clone() };
                    self.overlay.record(kind, id)?;
                }
            }
            RecordKind::Rename { from, to } => {
                if self.diverged(other, from) {
                    if self.overlay.will_rename_to(from, to) {
                        return Ok(Outcome::Identical);
                    }
                    if self.overlay.will_rename(from) || self.overlay.will_delete(from) {
                        return Err(conflict(from));
                    }
                }
                if !self.overlay.is_file(from) {
                    return Err(conflict(from));
                }
                if self.overlay.exists(to) || self.blocked(to) {
                    return Err(conflict(to));
                }
                self.overlay.record(record.kind.clone(), id)?;
            }
            RecordKind::Delete { path } => {
                if self.overlay.will_delete(path) {
                    return Ok(Outcome::Identical);
                }
                if !self.overlay.is_file(path) {
                    if strategy.allows_delete_conflict() {
                        return Ok(Outcome::Identical);
                    }
                    return Err(conflict(path));
                }
                if self.changed_here(other, path) && !strategy.allows_delete_conflict() {
                    return Err(conflict(path));
                }
                self.overlay.record(record.kind.clone(), id)?;
            }
        }
        Ok(Outcome::Applied)
    }

    /// True when this tree changed `path` through a record `other` has not
    /// seen, i.e. both sides touched it independently.
    fn diverged(&self, other: &Tree, path: &TreePath) -> bool {
        self.overlay.last_touch(path).is_some_and(|last: RecordId| !other.overlay.knows(&last))
    }

    /// The content at `path` was put there by this tree, unseen by `other`.
    fn changed_here(&self, other: &Tree, path: &TreePath) -> bool {
        self.diverged(other, path) && self.overlay.will_hold(path)
    }

    /// A file cannot be placed at `path`: it is a directory here, or lies
    /// below a file.
    fn blocked(&self, path: &TreePath) -> bool {
        self.overlay.is_directory(path) || self.overlay.view().file_ancestor(path).is_some()
    }
}

fn conflict(path: &TreePath) -> TreeError {
    warn!(path = %path, "Merge conflict");
    TreeError::MergeConflict(path.clone())
}
