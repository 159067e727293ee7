//! Offset-based content patches.
//!
//! An [`UpdateRecorder`] collects insertions and removals expressed against
//! byte offsets of a file's content. Nothing is applied until the recorder is
//! committed back to its tree, and the patches are then replayed against
//! whatever content the file holds at that moment.

use std::collections::BTreeMap;

use crate::fs::{Content, TreeError, TreePath, TreeResult};
use crate::overlay::TreeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    /// Insert before the byte at `offset`.
    InsertLeft { offset: usize, bytes: Content },
    /// Insert after the byte at `offset`; at the end of the content this
    /// appends.
    InsertRight { offset: usize, bytes: Content },
    Remove { offset: usize, length: usize },
}

#[derive(Debug, Clone)]
pub struct UpdateRecorder {
    path: TreePath,
    tree: TreeId,
    base_digest: blake3::Hash,
    ops: Vec<PatchOp>,
}

impl UpdateRecorder {
    pub(crate) fn new(path: TreePath, tree: TreeId, base: &Content) -> Self {
        Self { path, tree, base_digest: base.digest(), ops: Vec::new() }
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    /// The tree this recorder was opened on.
    pub fn tree_id(&self) -> TreeId {
        self.tree
    }

    /// Digest of the content at the time the recorder was opened.
    pub fn base_digest(&self) -> &blake3::Hash {
        &self.base_digest
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn insert_left(&mut self, offset: usize, bytes: impl Into<Content>) -> &mut Self {
        self.ops.push(PatchOp::InsertLeft { offset, bytes: bytes.into() });
        self
    }

    pub fn insert_right(&mut self, offset: usize, bytes: impl Into<Content>) -> &mut Self {
        self.ops.push(PatchOp::InsertRight { offset, bytes: bytes.into() });
        self
    }

    pub fn remove(&mut self, offset: usize, length: usize) -> &mut Self {
        self.ops.push(PatchOp::Remove { offset, length });
        self
    }

    /// Replay the recorded patches over `content`.
    ///
    /// For every offset from 0 to `content.len()`, left insertions at that
    /// offset come first (in recording order), then the original byte unless
    /// some removal covers it, then right insertions at that offset. The
    /// order in which patches were recorded only matters between insertions
    /// sharing both offset and side.
    pub fn apply(&self, content: &[u8]) -> TreeResult<Content> {
        let len = content.len();
        let mut removed = vec![false; len];
        let mut left: BTreeMap<usize, Vec<&[u8]>> = BTreeMap::new();
        let mut right: BTreeMap<usize, Vec<&[u8]>> = BTreeMap::new();
        let mut inserted = 0;

        for op in &self.ops {
            match op {
                PatchOp::InsertLeft { offset, bytes } | PatchOp::InsertRight { offset, bytes } => {
                    if *offset > len {
                        return Err(TreeError::InvalidUpdateRecord(format!(
                            "insertion at offset {offset} is past the end of {} ({len} bytes)",
                            self.path
                        )));
                    }
                    let side = if matches!(op, PatchOp::InsertLeft { .. }) {
                        &mut left
                    } else {
                        &mut right
                    };
                    side.entry(*offset).or_default().push(bytes.as_bytes());
                    inserted += bytes.len();
                }
                PatchOp::Remove { offset, length } => {
                    let end = offset.checked_add(*length).filter(|end| *end <= len).ok_or_else(
                        || {
                            TreeError::InvalidUpdateRecord(format!(
                                "removal of {length} bytes at offset {offset} is past the end of {} ({len} bytes)",
                                self.path
                            ))
                        },
                    )?;
                    removed[*offset..end].iter_mut().for_each(|flag| *flag = true);
                }
            }
        }

        let mut out = Vec::with_capacity(len + inserted);
        for offset in 0..=len {
            if let Some(chunks) = left.get(&offset) {
                chunks.iter().for_each(|chunk| out.extend_from_slice(chunk));
            }
            if offset < len && !removed[offset] {
                out.push(content[offset]);
            }
            if let Some(chunks) = right.get(&offset) {
                chunks.iter().for_each(|chunk| out.extend_from_slice(chunk));
            }
        }

        Ok(Content::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> UpdateRecorder {
        UpdateRecorder::new(TreePath::parse("/f").unwrap(), TreeId::new(), &Content::default())
    }

    #[test]
    fn test_insert_and_remove_round_trip() {
        let mut rec = recorder();
        rec.insert_left(0, "X").insert_right(6, "Y").remove(2, 2);
        assert_eq!(rec.apply(b"abcdef").unwrap(), "XabefY");
    }

    #[test]
    fn test_recording_order_does_not_matter_across_offsets() {
        let mut forward = recorder();
        forward.insert_left(1, "1").remove(3, 1).insert_right(4, "4");
        let mut backward = recorder();
        backward.insert_right(4, "4").remove(3, 1).insert_left(1, "1");
        assert_eq!(forward.apply(b"abcdef").unwrap(), backward.apply(b"abcdef").unwrap());
        assert_eq!(forward.apply(b"abcdef").unwrap(), "a1bce4f");
    }

    #[test]
    fn test_same_offset_and_side_keeps_recorded_order() {
        let mut rec = recorder();
        rec.insert_left(1, "x").insert_left(1, "y").insert_right(1, "p").insert_right(1, "q");
        assert_eq!(rec.apply(b"abc").unwrap(), "axybpqc");
    }

    #[test]
    fn test_overlapping_removals_excise_union() {
        let mut rec = recorder();
        rec.remove(1, 3).remove(2, 3);
        assert_eq!(rec.apply(b"abcdefg").unwrap(), "afg");
    }

    #[test]
    fn test_insertion_inside_removed_range_survives() {
        let mut rec = recorder();
        rec.remove(0, 3).insert_left(1, "Z");
        assert_eq!(rec.apply(b"abcd").unwrap(), "Zd");
    }

    #[test]
    fn test_empty_content_accepts_insertions_at_zero() {
        let mut rec = recorder();
        rec.insert_right(0, "b").insert_left(0, "a");
        assert_eq!(rec.apply(b"").unwrap(), "ab");
    }

    #[test]
    fn test_out_of_bounds_insert_is_invalid() {
        let mut rec = recorder();
        rec.insert_left(10, "x");
        assert!(matches!(rec.apply(b"abc"), Err(TreeError::InvalidUpdateRecord(_))));
    }

    #[test]
    fn test_out_of_bounds_remove_is_invalid() {
        let mut rec = recorder();
        rec.remove(2, 5);
        assert!(matches!(rec.apply(b"abc"), Err(TreeError::InvalidUpdateRecord(_))));
        let mut rec = recorder();
        rec.remove(1, usize::MAX);
        assert!(matches!(rec.apply(b"abc"), Err(TreeError::InvalidUpdateRecord(_))));
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let original = Content::from("abc");
        let mut rec = recorder();
        rec.remove(0, 3);
        assert_eq!(rec.apply(&original).unwrap(), "");
        assert_eq!(original, "abc");
    }
}
