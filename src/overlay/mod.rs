//! Copy-on-write structural state layered over a read-only backend.
//!
//! This module provides:
//! - The record log types shared by overlays, merges and action export
//! - The append-only [`Overlay`] store and its `will_*` predicates
//! - [`SyncView`], the synchronous existence/listing/read facade
//! - [`Snapshot`], a frozen overlay that can back another tree

mod record;
mod store;
mod view;

pub use record::{Record, RecordId, RecordKind, TreeId};
pub use store::Overlay;
pub use view::{Snapshot, SyncView};
