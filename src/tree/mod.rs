//! The transactional tree and everything built on its log.
//!
//! This module provides:
//! - [`Tree`], the mutation and query surface over an overlay
//! - Lazy [`DirEntry`]/[`FileEntry`] views with depth-first visiting
//! - Branch merging under a [`MergeStrategy`]
//! - [`Action`] export and the [`ActionSink`] consumers

mod action;
mod entry;
mod merge;
mod virtual_tree;

pub use action::{replay, Action, ActionSink, DryRunSink};
pub use entry::{DirEntry, DirListing, FileEntry};
pub use merge::MergeStrategy;
pub use virtual_tree::{Tree, TreeOptions};

pub use crate::overlay::TreeId;
