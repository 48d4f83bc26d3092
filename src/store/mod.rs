//! Hive-style partitioned storage shared by every layer.
//!
//! Layout under the lake root:
//!
//! ```text
//! {bronze,silver,gold}/sim_run_id=<id>/farm_id=<id>/date=<YYYY-MM-DD>/hour=<HH>/<file>.parquet
//! _state/<stage>.json
//! _runs/<sim_run_id>.json
//! _locks/<stage>/<partition>.lock
//! ```

pub mod atomic;
pub mod codec;
pub mod lock;
pub mod partition;

pub use codec::{Decoded, PartitionTable, SchemaDrift};
pub use partition::{Layer, PartitionFilter, PartitionKey};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::NaiveDate;
use walkdir::{DirEntry, WalkDir};

use crate::error::{PipelineError, Result};
use lock::LockGuard;

/// Partitioned store rooted at a data lake directory.
#[derive(Debug, Clone)]
pub struct PartitionedStore {
    root: PathBuf,
}

impl PartitionedStore {
    /// Store rooted at `root`; nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Lake root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `layer`.
    pub fn layer_dir(&self, layer: Layer) -> PathBuf {
        self.root.join(layer.as_str())
    }

    /// Directory of one partition.
    pub fn partition_dir(&self, layer: Layer, key: &PartitionKey) -> PathBuf {
        self.layer_dir(layer).join(key.relative_path())
    }

    /// Directory holding state files.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join("_state")
    }

    /// Directory holding scenario run manifests.
    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("_runs")
    }

    /// Directory holding lock files.
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("_locks")
    }

    /// Whether the partition directory exists.
    pub fn exists(&self, layer: Layer, key: &PartitionKey) -> bool {
        self.partition_dir(layer, key).is_dir()
    }

    /// Atomically publishes a partition containing exactly `files`.
    ///
    /// Readers never see a partially written partition: a file they open
    /// belongs either to the previous partition or to the complete new one.
    /// Replacing an existing partition takes two renames, so a reader that
    /// lists or opens the directory between them finds it missing for that
    /// instant; see [`atomic::publish_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if staging or the rename fails.
    pub fn write_files(&self, layer: Layer, key: &PartitionKey, files: &[(&str, Bytes)]) -> Result<()> {
        let borrowed: Vec<(&str, &[u8])> = files.iter().map(|(n, b)| (*n, b.as_ref())).collect();
        atomic::publish_dir(&self.partition_dir(layer, key), &borrowed)?;
        Ok(())
    }

    /// Encodes `rows` and publishes them as the partition's only file.
    ///
    /// # Errors
    ///
    /// Returns an encoding or I/O error; the partition is unchanged on failure.
    pub fn write<T: PartitionTable>(&self, layer: Layer, key: &PartitionKey, rows: &[T]) -> Result<()> {
        let bytes = codec::encode(rows)?;
        self.write_files(layer, key, &[(T::FILE_NAME, bytes)])
    }

    /// Raw bytes of one file of a partition.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] if the file does not exist.
    pub fn read_bytes(&self, layer: Layer, key: &PartitionKey, file_name: &str) -> Result<Bytes> {
        let path = self.partition_dir(layer, key).join(file_name);
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PipelineError::NotFound(format!("{layer}/{key}/{file_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads and decodes a partition's table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] or [`PipelineError::SourcePartitionCorrupt`].
    pub fn read<T: PartitionTable>(&self, layer: Layer, key: &PartitionKey) -> Result<Decoded<T>> {
        let bytes = self.read_bytes(layer, key, T::FILE_NAME)?;
        codec::decode(&bytes, &key.to_string())
    }

    /// Reads every partition of `layer` matching `filter`, in key order.
    ///
    /// # Errors
    ///
    /// Returns the first listing or decoding error.
    pub fn read_all<T: PartitionTable>(&self, layer: Layer, filter: &PartitionFilter) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for key in self.list_partitions(layer, filter) {
            rows.extend(self.read::<T>(layer, &key?)?.rows);
        }
        Ok(rows)
    }

    /// Removes a partition directory if present.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than the partition being absent.
    pub fn remove(&self, layer: Layer, key: &PartitionKey) -> Result<()> {
        match fs::remove_dir_all(self.partition_dir(layer, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Non-blocking advisory lock on `(stage, key)`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PartitionLocked`] if another worker holds it.
    pub fn lock_partition(&self, stage: &str, key: &PartitionKey) -> Result<LockGuard> {
        let mut path = self.locks_dir().join(stage).join(key.relative_path());
        path.set_extension("lock");
        LockGuard::try_acquire(&path)?.ok_or_else(|| PipelineError::PartitionLocked(format!("{stage}|{key}")))
    }

    /// Lazily enumerates partitions of `layer` matching `filter`, in key order.
    ///
    /// Directories whose names do not parse as partition segments, and hidden
    /// (`.`) or internal (`_`) entries, are skipped. Pruning happens per path
    /// level, so a run filter never descends into other runs.
    pub fn list_partitions(
        &self,
        layer: Layer,
        filter: &PartitionFilter,
    ) -> Box<dyn Iterator<Item = Result<PartitionKey>>> {
        let dir = self.layer_dir(layer);
        if !dir.is_dir() {
            return Box::new(std::iter::empty());
        }
        let filter = filter.clone();
        let walk = WalkDir::new(dir)
            .min_depth(4)
            .max_depth(4)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| admits(e, &filter));
        Box::new(walk.filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_dir() => parse_entry(&e).map(Ok),
            Ok(_) => None,
            Err(e) => Some(Err(PipelineError::Io(io::Error::other(e.to_string())))),
        }))
    }

    /// Collects [`PartitionedStore::list_partitions`].
    ///
    /// # Errors
    ///
    /// Returns the first directory walk error.
    pub fn partitions(&self, layer: Layer, filter: &PartitionFilter) -> Result<Vec<PartitionKey>> {
        self.list_partitions(layer, filter).collect()
    }
}

fn segment<'a>(e: &'a DirEntry, prefix: &str) -> Option<&'a str> {
    e.file_name().to_str()?.strip_prefix(prefix)
}

fn admits(e: &DirEntry, filter: &PartitionFilter) -> bool {
    let Some(name) = e.file_name().to_str() else {
        return false;
    };
    if e.depth() > 0 && (name.starts_with('.') || name.starts_with('_')) {
        return false;
    }
    match e.depth() {
        1 => segment(e, "sim_run_id=").is_some_and(|r| filter.admits_run(r)),
        2 => segment(e, "farm_id=").is_some_and(|f| filter.admits_farm(f)),
        3 => segment(e, "date=")
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .is_some_and(|d| filter.admits_date(d)),
        _ => true,
    }
}

fn parse_entry(e: &DirEntry) -> Option<PartitionKey> {
    let mut names: Vec<&str> = e
        .path()
        .components()
        .rev()
        .take(4)
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    names.reverse();
    let segments: [&str; 4] = names.try_into().ok()?;
    let key = PartitionKey::from_segments(segments);
    if key.is_none() {
        tracing::debug!(path = %e.path().display(), "skipping non-partition directory");
    }
    key
}
