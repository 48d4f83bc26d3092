//! Incremental processing state: which partitions each stage has processed.
//!
//! Stages receive a [`StateStore`] explicitly; nothing reads `_state/` as
//! ambient global state. [`FileStateStore`] persists one JSON file per stage,
//! [`MemoryStateStore`] backs tests.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};
use crate::store::PartitionKey;
use crate::store::atomic::atomic_write;
use crate::store::lock::LockGuard;

const STATE_VERSION: u32 = 1;
const LOCK_ATTEMPTS: u32 = 500;
const LOCK_DELAY: Duration = Duration::from_millis(10);

/// Fingerprint of the input a stage consumed for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    /// SHA-256 (hex) over the source bytes followed by the stage parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use wind_farm_twin::state::Watermark;
    ///
    /// let a = Watermark::compute(b"rows", b"{}");
    /// assert_eq!(a, Watermark::compute(b"rows", b"{}"));
    /// assert_ne!(a, Watermark::compute(b"rows", b"{\"max\":1}"));
    /// assert_eq!(a.as_str().len(), 64);
    /// ```
    pub fn compute(source: &[u8], params: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source);
        hasher.update(params);
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Processing status of one `(stage, partition)` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    /// Processing started and has not committed.
    Pending,
    /// Output durably written and watermark committed.
    Done,
    /// Last attempt failed; the partition stays eligible.
    Failed,
}

/// Persisted state of one `(stage, partition)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Watermark of the last successful processing, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
    /// Current status.
    pub status: ProcessingStatus,
}

/// Entry key: `stage|partition path`.
pub fn entry_key(stage: &str, key: &PartitionKey) -> String {
    format!("{stage}|{key}")
}

/// Narrow transactional interface over processing state.
///
/// `commit` is the only call that can make a partition skippable; it must be
/// durable before returning.
pub trait StateStore: Send + Sync {
    /// Watermark of a `DONE` entry, or `None`.
    fn get_watermark(&self, stage: &str, key: &PartitionKey) -> Result<Option<Watermark>>;

    /// Marks the entry `PENDING`, keeping any stored watermark.
    fn mark_pending(&self, stage: &str, key: &PartitionKey) -> Result<()>;

    /// Stores `watermark` and marks the entry `DONE`.
    fn commit(&self, stage: &str, key: &PartitionKey, watermark: &Watermark) -> Result<()>;

    /// Marks the entry `FAILED` without touching its watermark.
    fn record_failure(&self, stage: &str, key: &PartitionKey) -> Result<()>;

    /// All entries of `stage`, keyed by [`entry_key`].
    fn entries(&self, stage: &str) -> Result<BTreeMap<String, StateEntry>>;
}

fn apply(entries: &mut BTreeMap<String, StateEntry>, key: String, status: ProcessingStatus, watermark: Option<&Watermark>) {
    let entry = entries.entry(key).or_insert(StateEntry {
        watermark: None,
        status,
    });
    entry.status = status;
    if let Some(w) = watermark {
        entry.watermark = Some(w.clone());
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<BTreeMap<String, StateEntry>>,
}

impl MemoryStateStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, stage: &str, key: &PartitionKey, status: ProcessingStatus, watermark: Option<&Watermark>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut entries, entry_key(stage, key), status, watermark);
    }
}

impl StateStore for MemoryStateStore {
    fn get_watermark(&self, stage: &str, key: &PartitionKey) -> Result<Option<Watermark>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&entry_key(stage, key))
            .filter(|e| e.status == ProcessingStatus::Done)
            .and_then(|e| e.watermark.clone()))
    }

    fn mark_pending(&self, stage: &str, key: &PartitionKey) -> Result<()> {
        self.update(stage, key, ProcessingStatus::Pending, None);
        Ok(())
    }

    fn commit(&self, stage: &str, key: &PartitionKey, watermark: &Watermark) -> Result<()> {
        self.update(stage, key, ProcessingStatus::Done, Some(watermark));
        Ok(())
    }

    fn record_failure(&self, stage: &str, key: &PartitionKey) -> Result<()> {
        self.update(stage, key, ProcessingStatus::Failed, None);
        Ok(())
    }

    fn entries(&self, stage: &str) -> Result<BTreeMap<String, StateEntry>> {
        let prefix = format!("{stage}|");
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    entries: BTreeMap<String, StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// JSON-file store under `<lake>/_state/`.
///
/// Each mutation holds the in-process cache mutex plus a `.<stage>.lock`
/// file, re-reads the stage file, applies the change and replaces the file
/// with [`atomic_write`]. Readers never observe a partial file.
///
/// Parsed stage files are cached between mutations, so reads cost no I/O.
/// A commit by another process becomes visible here at this store's next
/// mutation of the same stage.
#[derive(Debug)]
pub struct FileStateStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, StateFile>>,
}

impl FileStateStore {
    /// Opens the store at `dir`, checking every existing stage file parses.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StateUnavailable`] if `dir` cannot be created
    /// or a stage file is unreadable.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| PipelineError::StateUnavailable(format!("{}: {e}", dir.display())))?;
        let store = Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        };
        let existing = fs::read_dir(&store.dir)
            .map_err(|e| PipelineError::StateUnavailable(format!("{}: {e}", store.dir.display())))?;
        for entry in existing.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|x| x == "json") {
                load(&path)?;
            }
        }
        Ok(store)
    }

    /// Directory holding the stage files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `stage`'s file.
    pub fn stage_path(&self, stage: &str) -> PathBuf {
        self.dir.join(format!("{stage}.json"))
    }

    /// Runs `read` over the cached file of `stage`, loading it on first use.
    fn with_cached<T>(&self, stage: &str, read: impl FnOnce(&StateFile) -> T) -> Result<T> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = cache.get(stage) {
            return Ok(read(file));
        }
        let file = load(&self.stage_path(stage))?;
        let out = read(&file);
        cache.insert(stage.to_string(), file);
        Ok(out)
    }

    fn update(&self, stage: &str, key: &PartitionKey, status: ProcessingStatus, watermark: Option<&Watermark>) -> Result<()> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let fail = |reason: String| PipelineError::StateCommitFailure {
            stage: stage.to_string(),
            partition: key.to_string(),
            reason,
        };
        let _file_lock = LockGuard::acquire_with_retry(&self.dir.join(format!(".{stage}.lock")), LOCK_ATTEMPTS, LOCK_DELAY)
            .map_err(|e| fail(e.to_string()))?;
        let path = self.stage_path(stage);
        cache.remove(stage);
        let mut file = load(&path)?;
        apply(&mut file.entries, entry_key(stage, key), status, watermark);
        let json = serde_json::to_vec_pretty(&file).map_err(|e| fail(e.to_string()))?;
        atomic_write(&path, &json).map_err(|e| fail(e.to_string()))?;
        cache.insert(stage.to_string(), file);
        Ok(())
    }
}

fn load(path: &Path) -> Result<StateFile> {
    let unavailable = |reason: String| PipelineError::StateUnavailable(format!("{}: {reason}", path.display()));
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StateFile::default()),
        Err(e) => return Err(unavailable(e.to_string())),
    };
    let file: StateFile = serde_json::from_str(&text).map_err(|e| unavailable(e.to_string()))?;
    if file.version != STATE_VERSION {
        return Err(unavailable(format!("unsupported state version {}", file.version)));
    }
    Ok(file)
}

impl StateStore for FileStateStore {
    fn get_watermark(&self, stage: &str, key: &PartitionKey) -> Result<Option<Watermark>> {
        let entry = entry_key(stage, key);
        self.with_cached(stage, |file| {
            file.entries
                .get(&entry)
                .filter(|e| e.status == ProcessingStatus::Done)
                .and_then(|e| e.watermark.clone())
        })
    }

    fn mark_pending(&self, stage: &str, key: &PartitionKey) -> Result<()> {
        self.update(stage, key, ProcessingStatus::Pending, None)
    }

    fn commit(&self, stage: &str, key: &PartitionKey, watermark: &Watermark) -> Result<()> {
        self.update(stage, key, ProcessingStatus::Done, Some(watermark))
    }

    fn record_failure(&self, stage: &str, key: &PartitionKey) -> Result<()> {
        self.update(stage, key, ProcessingStatus::Failed, None)
    }

    fn entries(&self, stage: &str) -> Result<BTreeMap<String, StateEntry>> {
        self.with_cached(stage, |file| file.entries.clone())
    }
}
