//! In-memory transactional virtual filesystem.
//!
//! A [`Tree`] stages file creations, overwrites, renames and deletions as an
//! append-only log over a read-only [`Backend`]. Trees branch into isolated
//! copies, merge back under a [`MergeStrategy`], and export their log as
//! [`Action`]s for an external sink to apply or report.

pub mod backend;
pub mod config;
pub mod fs;
pub mod overlay;
pub mod tree;
pub mod update;

pub use backend::{Backend, EmptyBackend, MemoryBackend};
pub use fs::{Content, PathFragment, TreeError, TreePath, TreeResult};
pub use tree::{
    Action, ActionSink, DirEntry, DryRunSink, FileEntry, MergeStrategy, Tree, TreeId, TreeOptions,
};
pub use update::{PatchOp, UpdateRecorder};
