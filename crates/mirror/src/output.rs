use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::INDEX_FILE_NAME;
use crate::error::MirrorError;
use crate::rewrite::ResourceLink;

/// Create a directory and all of its parents if missing.
pub async fn create_dirs(path: &Path) -> Result<(), MirrorError> {
    if !path.as_os_str().is_empty() {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Creates `output_dir` plus every directory a link's local path lives in,
/// so workers only ever create files.
pub async fn prepare_link_dirs(
    output_dir: &Path,
    links: &[ResourceLink],
) -> Result<(), MirrorError> {
    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    dirs.insert(output_dir.to_path_buf());
    for link in links {
        if let Some(parent) = output_dir.join(&link.local_path).parent() {
            dirs.insert(parent.to_path_buf());
        }
    }

    for dir in &dirs {
        debug!(path = %dir.display(), "Creating directory");
        create_dirs(dir).await?;
    }
    Ok(())
}

/// Writes the rewritten manifest to `output_dir/index.m3u8`, replacing any
/// previous file. Returns the written path.
pub async fn write_manifest(output_dir: &Path, manifest: &str) -> Result<PathBuf, MirrorError> {
    create_dirs(output_dir).await?;
    let path = output_dir.join(INDEX_FILE_NAME);
    tokio::fs::write(&path, manifest).await?;
    debug!(path = %path.display(), bytes = manifest.len(), "Manifest written");
    Ok(path)
}
