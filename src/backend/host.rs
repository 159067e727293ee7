//! Snapshot of a host directory.
//!
//! Reading the disk is asynchronous, so it happens here, once, before any
//! tree exists. The result is a plain [`MemoryBackend`] that answers every
//! query synchronously.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::backend::MemoryBackend;
use crate::fs::{Content, TreePath};

/// Read every regular file under `root` into memory.
///
/// Directory names listed in `ignore` are skipped wherever they appear.
/// Symlinks and other special files are not followed.
pub async fn capture(root: impl AsRef<Path>, ignore: &[String]) -> Result<MemoryBackend> {
    let root = root.as_ref();
    let mut backend = MemoryBackend::new();
    let mut pending: Vec<(PathBuf, TreePath)> = vec![(root.to_path_buf(), TreePath::root())];

    while let Some((dir, tree_dir)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("failed to list {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            let file_type = entry.file_type().await?;
            let tree_path = tree_dir.join(&name)?;

            if file_type.is_dir() {
                if ignore.iter().any(|ignored| *ignored == name) {
                    debug!(path = %tree_path, "Ignoring directory");
                    continue;
                }
                pending.push((entry.path(), tree_path));
            } else if file_type.is_file() {
                let bytes = tokio::fs::read(entry.path())
                    .await
                    .with_context(|| format!("failed to read {}", entry.path().display()))?;
                backend.insert(tree_path, Content::from(bytes))?;
            }
        }
    }

    info!(root = %root.display(), files = backend.len(), "Captured host snapshot");

    Ok(backend)
}
