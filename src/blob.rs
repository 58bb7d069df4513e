//! Filesystem-backed blob storage, rooted at a workspace directory.
//!
//! Objects are addressed by `(container, object)`; slashes in `object`
//! become nested directories under `workspace/container/`. All operations
//! are synchronous — handlers run them through [`crate::metadata::blocking`]
//! or their own `spawn_blocking` call so the executor isn't stalled.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// A handle onto a workspace directory on disk.
#[derive(Clone)]
pub struct Blob {
    workspace: PathBuf,
}

impl Blob {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Blob { workspace: workspace.into() }
    }

    fn path(&self, container: &str, object: &str) -> PathBuf {
        self.workspace.join(container).join(object)
    }

    /// Opens `(container, object)` for sequential read.
    pub fn reader(&self, container: &str, object: &str) -> Result<File> {
        let path = self.path(container, object);
        File::open(&path).with_context(|| format!("could not open file {}", path.display()))
    }

    /// Creates (or truncates) `(container, object)` for sequential write,
    /// creating parent directories as needed.
    pub fn writer(&self, container: &str, object: &str) -> Result<File> {
        let path = self.path(container, object);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create directory {}", parent.display()))?;
        }
        File::create(&path).with_context(|| format!("could not create file {}", path.display()))
    }

    /// Byte-exact duplication with an explicit flush on destination completion.
    pub fn copy(&self, sc: &str, so: &str, dc: &str, do_: &str) -> Result<u64> {
        let mut src = self.reader(sc, so).context("copy: source")?;

        let dst_path = self.path(dc, do_);
        if let Some(parent) = dst_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create directory {}", parent.display()))?;
        }
        let mut dst = File::create(&dst_path).context("copy: destination")?;

        let written = io::copy(&mut src, &mut dst).context("copy")?;
        dst.sync_all().context("copy: destination")?;
        Ok(written)
    }

    /// Lists file (not directory) names directly under `workspace/prefix`,
    /// in the platform's native directory-listing order.
    pub fn filenames_from(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.workspace.join(prefix);
        let entries = fs::read_dir(&dir).with_context(|| format!("could not list {}", dir.display()))?;

        let mut filenames = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            filenames.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(filenames)
    }

    pub fn exists(&self, container: &str, object: &str) -> bool {
        self.path(container, object).exists()
    }

    /// Best-effort delete of `(container, object)`; recursive when `object`
    /// names a directory (or is empty, removing the whole container).
    pub fn remove(&self, container: &str, object: &str) -> Result<()> {
        let path = self.path(container, object);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) if path.is_file() => {
                fs::remove_file(&path).with_context(|| format!("could not delete {}", path.display()))
            }
            Err(err) => Err(err).with_context(|| format!("could not delete {}", path.display())),
        }
    }

    /// Walks the workspace, attributing each file to every ancestor
    /// directory as a +1 counter, then deletes every directory whose
    /// counter ends at zero.
    pub fn cleanup(&self) -> Result<()> {
        let mut counts: std::collections::HashMap<PathBuf, usize> = std::collections::HashMap::new();
        walk(&self.workspace, &self.workspace, &mut counts)?;

        for (dir, count) in counts {
            if count == 0 {
                let _ = fs::remove_dir_all(&dir);
            }
        }
        Ok(())
    }
}

fn walk(
    workspace: &Path,
    dir: &Path,
    counts: &mut std::collections::HashMap<PathBuf, usize>,
) -> Result<()> {
    if dir != workspace {
        counts.entry(dir.to_path_buf()).or_insert(0);
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("cleanup: could not read {}", dir.display())),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type()?.is_dir() {
            walk(workspace, &path, counts)?;
            continue;
        }

        if path.file_name().and_then(|n| n.to_str()) == Some(".DS_Store") {
            continue;
        }

        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            if dir == workspace || !dir.starts_with(workspace) {
                break;
            }
            *counts.entry(dir.to_path_buf()).or_insert(0) += 1;
            ancestor = dir.parent();
        }
    }

    Ok(())
}
