//! Merge integration tests - conflict detection and strategy flags

use std::sync::Arc;

use anyhow::Result;
use stagefs::{
    EmptyBackend, MemoryBackend, MergeStrategy, Tree, TreeError, TreeOptions, TreePath,
};

fn tree_with(files: &[(&str, &str)]) -> Result<Tree> {
    Ok(Tree::new(MemoryBackend::from_files(files.iter().copied())?))
}

fn conflict_at(path: &str) -> TreeError {
    TreeError::MergeConflict(TreePath::parse(path).unwrap())
}

#[test]
fn test_strict_merge_of_disjoint_changes() -> Result<()> {
    let mut parent = tree_with(&[("/a", "1"), ("/b", "2"), ("/untouched", "u")])?;
    let mut branch = parent.branch();
    branch.overwrite("/a", "10")?;
    branch.create("/c", "3")?;
    branch.rename("/b", "/d/b")?;
    parent.create("/p", "parent only")?;

    parent.merge(&branch, MergeStrategy::DEFAULT)?;

    assert_eq!(parent.read_to_string("/a").unwrap(), "10");
    assert_eq!(parent.read_to_string("/c").unwrap(), "3");
    assert!(!parent.exists("/b"));
    assert_eq!(parent.read_to_string("/d/b").unwrap(), "2");
    assert_eq!(parent.read_to_string("/untouched").unwrap(), "u");
    assert_eq!(parent.read_to_string("/p").unwrap(), "parent only");
    Ok(())
}

#[test]
fn test_merge_refreshes_directory_listings() -> Result<()> {
    let mut parent = tree_with(&[("/d/a", "1")])?;
    assert_eq!(parent.get_dir("/d")?.subfiles().len(), 1);
    let mut branch = parent.branch();
    branch.create("/d/b", "2")?;

    parent.merge(&branch, MergeStrategy::DEFAULT)?;
    assert_eq!(parent.get_dir("/d")?.subfiles().len(), 2);
    Ok(())
}

#[test]
fn test_merging_twice_is_idempotent() -> Result<()> {
    let mut parent = Tree::empty();
    let mut branch = parent.branch();
    branch.create("/a", "1")?;

    parent.merge(&branch, MergeStrategy::DEFAULT)?;
    parent.merge(&branch, MergeStrategy::DEFAULT)?;
    assert_eq!(parent.records().len(), 1);
    Ok(())
}

#[test]
fn test_own_history_is_not_reapplied() -> Result<()> {
    let mut parent = Tree::empty();
    parent.create("/a", "1")?;
    let mut branch = parent.branch();
    branch.overwrite("/a", "2")?;

    parent.merge(&branch, MergeStrategy::DEFAULT)?;
    assert_eq!(parent.records().len(), 2);
    assert_eq!(parent.read_to_string("/a").unwrap(), "2");

    branch.merge(&parent, MergeStrategy::DEFAULT)?;
    assert_eq!(branch.records().len(), 2);
    Ok(())
}

#[test]
fn test_sibling_branches_share_ancestry() -> Result<()> {
    let mut root = Tree::empty();
    root.create("/base", "b")?;
    let mut first = root.branch();
    first.create("/one", "1")?;
    let mut second = first.branch();
    second.create("/two", "2")?;

    root.merge(&first, MergeStrategy::DEFAULT)?;
    root.merge(&second, MergeStrategy::DEFAULT)?;

    assert_eq!(root.records().len(), 3);
    assert!(root.exists("/one"));
    assert!(root.exists("/two"));
    Ok(())
}

#[test]
fn test_both_create_same_path_conflicts() -> Result<()> {
    let parent = Tree::empty();
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.create("/x", "left")?;
    right.create("/x", "right")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/x")));
    assert_eq!(left.read_to_string("/x").unwrap(), "left");

    left.merge(&right, MergeStrategy::ALLOW_CREATION_CONFLICT)?;
    assert_eq!(left.read_to_string("/x").unwrap(), "right");
    Ok(())
}

#[test]
fn test_creation_over_backend_file_conflicts() -> Result<()> {
    let mut parent = tree_with(&[("/x", "backend")])?;
    let mut branch = Tree::empty();
    branch.create("/x", "fresh")?;

    assert_eq!(parent.merge(&branch, MergeStrategy::DEFAULT), Err(conflict_at("/x")));
    parent.merge(&branch, MergeStrategy::OVERWRITE)?;
    assert_eq!(parent.read_to_string("/x").unwrap(), "fresh");
    Ok(())
}

#[test]
fn test_concurrent_overwrites_conflict() -> Result<()> {
    let parent = tree_with(&[("/f", "0")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.overwrite("/f", "1")?;
    right.overwrite("/f", "2")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/f")));
    assert_eq!(
        left.merge(&right, MergeStrategy::ALLOW_CREATION_CONFLICT),
        Err(conflict_at("/f"))
    );

    left.merge(&right, MergeStrategy::CONTENT_ONLY)?;
    assert_eq!(left.read_to_string("/f").unwrap(), "2");
    Ok(())
}

#[test]
fn test_identical_overwrites_do_not_conflict() -> Result<()> {
    let parent = tree_with(&[("/f", "0")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.overwrite("/f", "same")?;
    right.overwrite("/f", "same")?;

    left.merge(&right, MergeStrategy::DEFAULT)?;
    assert_eq!(left.records().len(), 1);
    Ok(())
}

#[test]
fn test_overwrite_of_locally_deleted_file_conflicts() -> Result<()> {
    let parent = tree_with(&[("/f", "0")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.delete("/f")?;
    right.overwrite("/f", "2")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/f")));
    left.merge(&right, MergeStrategy::ALLOW_OVERWRITE_CONFLICT)?;
    assert_eq!(left.read_to_string("/f").unwrap(), "2");
    Ok(())
}

#[test]
fn test_diverging_renames_always_conflict() -> Result<()> {
    let parent = tree_with(&[("/a", "1")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.rename("/a", "/b")?;
    right.rename("/a", "/c")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/a")));
    assert_eq!(left.merge(&right, MergeStrategy::OVERWRITE), Err(conflict_at("/a")));
    Ok(())
}

#[test]
fn test_identical_renames_do_not_conflict() -> Result<()> {
    let parent = tree_with(&[("/a", "1")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.rename("/a", "/b")?;
    right.rename("/a", "/b")?;

    left.merge(&right, MergeStrategy::DEFAULT)?;
    assert_eq!(left.read_to_string("/b").unwrap(), "1");
    assert_eq!(left.records().len(), 1);
    Ok(())
}

#[test]
fn test_rename_onto_existing_path_conflicts() -> Result<()> {
    let parent = tree_with(&[("/a", "1")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.create("/b", "mine")?;
    right.rename("/a", "/b")?;

    assert_eq!(left.merge(&right, MergeStrategy::OVERWRITE), Err(conflict_at("/b")));
    Ok(())
}

#[test]
fn test_delete_of_modified_file_needs_delete_flag() -> Result<()> {
    let parent = tree_with(&[("/f", "0")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.overwrite("/f", "1")?;
    right.delete("/f")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/f")));
    // The overwrite flag does not cover deletes.
    assert_eq!(left.merge(&right, MergeStrategy::CONTENT_ONLY), Err(conflict_at("/f")));

    left.merge(&right, MergeStrategy::ALLOW_DELETE_CONFLICT)?;
    assert!(!left.exists("/f"));
    Ok(())
}

#[test]
fn test_delete_of_missing_file() -> Result<()> {
    let parent = tree_with(&[("/f", "0")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.rename("/f", "/g")?;
    right.delete("/f")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/f")));
    left.merge(&right, MergeStrategy::ALLOW_DELETE_CONFLICT)?;
    assert_eq!(left.read_to_string("/g").unwrap(), "0");
    Ok(())
}

#[test]
fn test_delete_on_both_sides_is_not_a_conflict() -> Result<()> {
    let parent = tree_with(&[("/f", "0")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.delete("/f")?;
    right.delete("/f")?;

    left.merge(&right, MergeStrategy::DEFAULT)?;
    assert_eq!(left.records().len(), 1);
    Ok(())
}

#[test]
fn test_merge_default_uses_tree_options() -> Result<()> {
    let options = TreeOptions { default_strategy: MergeStrategy::OVERWRITE, ..Default::default() };
    let parent = Tree::with_options(Arc::new(EmptyBackend), options);
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.create("/x", "left")?;
    right.create("/x", "right")?;

    left.merge_default(&right)?;
    assert_eq!(left.read_to_string("/x").unwrap(), "right");
    Ok(())
}

#[test]
fn test_failed_merge_keeps_records_applied_before_conflict() -> Result<()> {
    let parent = Tree::empty();
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.create("/x", "left")?;
    right.create("/ok", "fine")?;
    right.create("/x", "right")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/x")));
    assert!(left.exists("/ok"));
    assert_eq!(left.read_to_string("/x").unwrap(), "left");
    Ok(())
}

/// Left replaces `/a` by renaming `/b` onto it, unseen by right.
fn left_renamed_onto_a() -> Result<(Tree, Tree)> {
    let parent = tree_with(&[("/a", "A"), ("/b", "B")])?;
    let mut left = parent.branch();
    let right = parent.branch();
    left.delete("/a")?;
    left.rename("/b", "/a")?;
    Ok((left, right))
}

#[test]
fn test_overwrite_of_rename_target_conflicts() -> Result<()> {
    let (mut left, mut right) = left_renamed_onto_a()?;
    right.overwrite("/a", "R")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/a")));
    assert_eq!(left.read_to_string("/a").unwrap(), "B");

    left.merge(&right, MergeStrategy::CONTENT_ONLY)?;
    assert_eq!(left.read_to_string("/a").unwrap(), "R");
    Ok(())
}

#[test]
fn test_delete_of_rename_target_conflicts() -> Result<()> {
    let (mut left, mut right) = left_renamed_onto_a()?;
    right.delete("/a")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/a")));
    assert_eq!(left.read_to_string("/a").unwrap(), "B");

    left.merge(&right, MergeStrategy::ALLOW_DELETE_CONFLICT)?;
    assert!(!left.exists("/a"));
    Ok(())
}

#[test]
fn test_create_at_rename_target_conflicts() -> Result<()> {
    let parent = tree_with(&[("/b", "B")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.rename("/b", "/c")?;
    right.create("/c", "R")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/c")));
    assert_eq!(left.read_to_string("/c").unwrap(), "B");
    Ok(())
}

#[test]
fn test_identical_creates_do_not_conflict() -> Result<()> {
    let parent = Tree::empty();
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.create("/x", "same")?;
    right.create("/x", "same")?;

    left.merge(&right, MergeStrategy::DEFAULT)?;
    assert_eq!(left.records().len(), 1);
    assert_eq!(left.read_to_string("/x").unwrap(), "same");
    Ok(())
}

#[test]
fn test_create_below_local_file_conflicts() -> Result<()> {
    let parent = tree_with(&[("/d/x", "1")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.delete("/d/x")?;
    left.create("/d", "file")?;
    right.create("/d/y", "2")?;

    assert_eq!(left.merge(&right, MergeStrategy::OVERWRITE), Err(conflict_at("/d/y")));
    assert_eq!(left.read_to_string("/d").unwrap(), "file");
    Ok(())
}

#[test]
fn test_create_over_local_directory_conflicts() -> Result<()> {
    let parent = Tree::empty();
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.create("/p/q", "1")?;
    right.create("/p", "2")?;

    assert_eq!(left.merge(&right, MergeStrategy::OVERWRITE), Err(conflict_at("/p")));
    assert!(left.is_directory("/p"));
    Ok(())
}

#[test]
fn test_rename_below_local_file_conflicts() -> Result<()> {
    let parent = tree_with(&[("/a", "1")])?;
    let mut left = parent.branch();
    let mut right = parent.branch();
    left.create("/d", "file")?;
    right.rename("/a", "/d/a")?;

    assert_eq!(left.merge(&right, MergeStrategy::OVERWRITE), Err(conflict_at("/d/a")));
    assert_eq!(left.read_to_string("/a").unwrap(), "1");
    Ok(())
}

#[test]
fn test_overwrite_of_unknown_path_needs_overwrite_flag() -> Result<()> {
    let mut left = Tree::empty();
    let mut right = tree_with(&[("/f", "0")])?;
    right.overwrite("/f", "1")?;

    assert_eq!(left.merge(&right, MergeStrategy::DEFAULT), Err(conflict_at("/f")));
    assert!(!left.exists("/f"));

    left.merge(&right, MergeStrategy::CONTENT_ONLY)?;
    assert_eq!(left.read_to_string("/f").unwrap(), "1");
    Ok(())
}
