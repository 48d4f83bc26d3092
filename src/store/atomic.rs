//! Crash-safe publication of files and partition directories.
//!
//! Data is written under a hidden sibling name, flushed with `sync_all()`, and
//! renamed into place, so readers see either the old content or the new
//! content and never a partial write.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling of `path` tagged `kind`, unique per process and call.
fn sibling(path: &Path, kind: &str) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut hidden = OsString::from(".");
    hidden.push(name);
    hidden.push(format!(
        ".{kind}-{}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    Ok(path.with_file_name(hidden))
}

fn sync_parent(path: &Path) {
    // Directory fsync is best-effort; not every platform can open directories.
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Atomically writes `data` to `path` using the write-rename pattern.
///
/// 1. Write to a hidden temp file next to `path`
/// 2. `sync_all()` to flush to disk
/// 3. `rename` temp to final path
///
/// If the process crashes during step 1 or 2, the original file at `path`
/// remains untouched.
///
/// # Errors
///
/// Returns any I/O error; the temp file is removed on failure.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = sibling(path, "tmp")?;
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    } else {
        sync_parent(path);
    }
    result
}

/// Atomically replaces directory `dir` with one containing exactly `files`.
///
/// Files are written and synced into a hidden temp directory, any existing
/// `dir` is moved aside, the temp directory is renamed to `dir`, and the old
/// copy is removed. Leftovers of a crashed publication of the same `dir` are
/// cleaned up first by [`recover`].
///
/// No reader ever opens a partial file, but replacing an existing `dir` is
/// two renames, not one: between moving the old directory aside and renaming
/// the new one in, `dir` does not exist. A concurrent listing can miss the
/// partition for that instant, and a reader opening it gets `NotFound`.
///
/// # Errors
///
/// Returns any I/O error; on failure `dir` keeps its previous content.
pub fn publish_dir(dir: &Path, files: &[(&str, &[u8])]) -> io::Result<()> {
    let parent = dir
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "directory has no parent"))?;
    fs::create_dir_all(parent)?;
    recover(dir)?;

    let tmp = sibling(dir, "tmp")?;
    let staged = (|| {
        fs::create_dir(&tmp)?;
        for (name, data) in files {
            let mut file = File::create(tmp.join(name))?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        Ok::<_, io::Error>(())
    })();
    if let Err(e) = staged {
        let _ = fs::remove_dir_all(&tmp);
        return Err(e);
    }

    let old = if dir.exists() {
        let old = sibling(dir, "old")?;
        if let Err(e) = fs::rename(dir, &old) {
            let _ = fs::remove_dir_all(&tmp);
            return Err(e);
        }
        Some(old)
    } else {
        None
    };

    if let Err(e) = fs::rename(&tmp, dir) {
        if let Some(old) = &old {
            let _ = fs::rename(old, dir);
        }
        let _ = fs::remove_dir_all(&tmp);
        return Err(e);
    }
    sync_parent(dir);
    if let Some(old) = old {
        fs::remove_dir_all(old)?;
    }
    Ok(())
}

/// Cleans up after a publication of `dir` that crashed.
///
/// Temp directories are removed. If the crash fell between the two renames,
/// `dir` is missing and the moved-aside copy is renamed back first; any other
/// `.old-` sibling is removed.
///
/// # Errors
///
/// Returns any I/O error from listing, renaming or removing.
pub fn recover(dir: &Path) -> io::Result<()> {
    let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
        return Ok(());
    };
    let name = name.to_string_lossy();
    let tmp_prefix = format!(".{name}.tmp-");
    let old_prefix = format!(".{name}.old-");
    let mut olds = Vec::new();
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let entry_name = entry.file_name();
        let entry_name = entry_name.to_string_lossy();
        if entry_name.starts_with(&tmp_prefix) {
            tracing::debug!(path = %entry.path().display(), "removing stale temp directory");
            fs::remove_dir_all(entry.path())?;
        } else if entry_name.starts_with(&old_prefix) {
            olds.push(entry.path());
        }
    }
    olds.sort();
    if !dir.exists() {
        if let Some(last) = olds.pop() {
            tracing::warn!(path = %dir.display(), "restoring partition left aside by an interrupted publish");
            fs::rename(&last, dir)?;
        }
    }
    for old in olds {
        tracing::debug!(path = %old.display(), "removing stale previous directory");
        fs::remove_dir_all(old)?;
    }
    Ok(())
}
