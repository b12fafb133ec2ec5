//! Filesystem helpers for staged builds.
//!
//! A build writes into a sibling staging directory and is then published:
//!
//! ```text
//! dist/            (live)         ──rename──►  .dist.old/   (removed)
//! .dist.staging/   (new build)    ──rename──►  dist/
//! ```
//!
//! While the renames happen, a server following the swap pointer reads from
//! the staging tree, so it never sees a missing or half-written `dist/`.

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

/// `/site/dist` → `/site/.dist.staging`
pub fn staging_dir(target: &Path) -> PathBuf {
    sibling(target, "staging")
}

/// `/site/dist` → `/site/.dist.old`, where the previous build waits to be removed
pub fn retired_dir(target: &Path) -> PathBuf {
    sibling(target, "old")
}

/// `/site/.dist.staging` → `/site/dist`; `None` for anything else.
pub fn published_dir(staging: &Path) -> Option<PathBuf> {
    let name = staging.file_name()?.to_str()?;
    let target = name.strip_prefix('.')?.strip_suffix(".staging")?;
    (!target.is_empty()).then(|| staging.with_file_name(target))
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(".");
    name.push(suffix);
    target.with_file_name(name)
}

/// Remove `dir` with everything in it and create it again, empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to clear {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

/// Copy the tree under `src` into `dst`, keeping permissions.
///
/// A missing `src` copies nothing.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            let permissions = entry.metadata()?.permissions();
            fs::set_permissions(&target, permissions)?;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy one file, creating parent directories. `fs::copy` carries the
/// permission bits over.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Move the finished `staging` tree to `target`.
///
/// When `serving` is given it is pointed at `staging` for the duration of
/// the swap and at `target` afterwards.
pub fn publish(staging: &Path, target: &Path, serving: Option<&ArcSwap<PathBuf>>) -> Result<()> {
    let retired = retired_dir(target);
    if retired.exists() {
        fs::remove_dir_all(&retired)
            .with_context(|| format!("Failed to clear {}", retired.display()))?;
    }

    if let Some(root) = serving {
        root.store(Arc::new(staging.to_path_buf()));
    }

    if target.exists() {
        fs::rename(target, &retired)
            .with_context(|| format!("Failed to move {} aside", target.display()))?;
    }
    fs::rename(staging, target)
        .with_context(|| format!("Failed to publish {}", target.display()))?;

    if let Some(root) = serving {
        root.store(Arc::new(target.to_path_buf()));
    }

    if retired.exists() {
        fs::remove_dir_all(&retired)
            .with_context(|| format!("Failed to remove {}", retired.display()))?;
    }
    Ok(())
}
