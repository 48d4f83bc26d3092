//! Scoped advisory lock files.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Utc;

/// An exclusively created lock file, removed when the guard drops.
///
/// Creation uses `create_new`, so at most one holder exists per path across
/// threads and processes. A lock left behind by a killed process must be
/// removed by hand.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Tries once to create the lock file at `path`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(guard))` - The lock is held until `guard` drops
    /// * `Ok(None)` - Someone else holds the lock
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than the file already existing.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let guard = Self {
                    path: path.to_path_buf(),
                };
                writeln!(file, "pid={}", std::process::id())?;
                writeln!(file, "acquired={}", Utc::now().to_rfc3339())?;
                Ok(Some(guard))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Retries [`LockGuard::try_acquire`] up to `attempts` times, sleeping
    /// `delay` between tries.
    ///
    /// # Errors
    ///
    /// Returns `WouldBlock` if the lock is still held after the last attempt.
    pub fn acquire_with_retry(path: &Path, attempts: u32, delay: Duration) -> io::Result<Self> {
        for attempt in 0..attempts.max(1) {
            if let Some(guard) = Self::try_acquire(path)? {
                return Ok(guard);
            }
            if attempt + 1 < attempts {
                thread::sleep(delay);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            format!("lock {} is held", path.display()),
        ))
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("silver/sim_run_id=A/hour=01.lock");
        let first = LockGuard::try_acquire(&path).expect("io");
        assert!(first.is_some());
        assert!(LockGuard::try_acquire(&path).expect("io").is_none());
        drop(first);
        assert!(!path.exists());
        assert!(LockGuard::try_acquire(&path).expect("io").is_some());
    }

    #[test]
    fn retry_gives_up_while_held() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.lock");
        let _held = LockGuard::try_acquire(&path).expect("io");
        let err = LockGuard::acquire_with_retry(&path, 3, Duration::from_millis(1)).err();
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::WouldBlock));
    }

    #[test]
    fn lock_file_records_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("x.lock");
        let guard = LockGuard::try_acquire(&path).expect("io").expect("free");
        let content = fs::read_to_string(guard.path()).expect("read");
        assert!(content.contains(&format!("pid={}", std::process::id())));
    }
}
