//! Incremental stage runner shared by Silver and Gold.
//!
//! For every source partition matching the filter the runner takes the
//! partition lock, fingerprints the source, skips it when the committed
//! watermark matches and the output exists, and otherwise processes, publishes
//! and commits. One partition's failure never stops its siblings; only fatal
//! kinds abort the invocation.

pub mod gold;
pub mod silver;

pub use gold::GoldAggregator;
pub use silver::SilverProcessor;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::{ErrorKind, PipelineError, Result};
use crate::state::{StateStore, Watermark};
use crate::store::{Layer, PartitionFilter, PartitionKey, PartitionedStore, SchemaDrift};

/// Output of processing one partition.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    /// Files published together as the target partition.
    pub files: Vec<(&'static str, Bytes)>,
    /// Rows written across all files.
    pub records: usize,
    /// Schema drift seen in the source partition.
    pub drift: Vec<SchemaDrift>,
}

/// One pipeline stage: a pure transform from a source partition to a target
/// partition with the same key.
pub trait StageProcessor: Sync {
    /// Stage name used for state entries and lock files.
    fn name(&self) -> &'static str;

    /// Layer read.
    fn source(&self) -> Layer;

    /// Layer written.
    fn target(&self) -> Layer;

    /// Source file whose bytes form the watermark.
    fn source_file(&self) -> &'static str;

    /// Transform parameters folded into the watermark for `key`.
    fn params(&self, key: &PartitionKey) -> Result<Vec<u8>>;

    /// Transforms the source partition bytes.
    fn process(&self, key: &PartitionKey, source: &Bytes) -> Result<StageOutput>;
}

/// Result of one partition.
#[derive(Debug)]
pub enum PartitionOutcome {
    /// Processed, published and committed.
    Processed {
        /// Rows written.
        records: usize,
        /// Whether the source drifted from the expected schema.
        drift: bool,
    },
    /// Watermark unchanged; nothing done.
    Unchanged,
    /// Another worker holds the lock.
    Locked,
    /// Not started because the invocation was cancelled.
    Cancelled,
    /// Processing failed; the watermark was not advanced.
    Failed(PipelineError),
}

/// End-of-run tally for one stage invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Stage name.
    pub stage: String,
    /// Partitions processed and committed.
    pub processed: usize,
    /// Partitions skipped on an unchanged watermark.
    pub unchanged: usize,
    /// Partitions skipped because they were locked.
    pub locked: usize,
    /// Partitions not started after cancellation.
    pub cancelled: usize,
    /// Processed partitions whose source schema drifted.
    pub schema_drift: usize,
    /// Rows written.
    pub records: usize,
    /// Failures by kind.
    pub failures_by_kind: BTreeMap<ErrorKind, usize>,
    /// Failed partitions with their error message.
    pub failures: Vec<(PartitionKey, String)>,
}

impl RunSummary {
    fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, key: PartitionKey, outcome: PartitionOutcome) {
        match outcome {
            PartitionOutcome::Processed { records, drift } => {
                self.processed += 1;
                self.records += records;
                if drift {
                    self.schema_drift += 1;
                }
            }
            PartitionOutcome::Unchanged => self.unchanged += 1,
            PartitionOutcome::Locked => self.locked += 1,
            PartitionOutcome::Cancelled => self.cancelled += 1,
            PartitionOutcome::Failed(e) => {
                *self.failures_by_kind.entry(e.kind()).or_default() += 1;
                self.failures.push((key, e.to_string()));
            }
        }
    }

    /// Number of failed partitions.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether every attempted partition committed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} summary ---", self.stage)?;
        writeln!(f, "Processed:             {} ({} records)", self.processed, self.records)?;
        writeln!(f, "Unchanged (skipped):   {}", self.unchanged)?;
        writeln!(f, "Locked (skipped):      {}", self.locked)?;
        if self.cancelled > 0 {
            writeln!(f, "Cancelled:             {}", self.cancelled)?;
        }
        writeln!(f, "Schema drift:          {}", self.schema_drift)?;
        write!(f, "Failed:                {}", self.failed())?;
        for (kind, n) in &self.failures_by_kind {
            write!(f, "\n  {kind}: {n}")?;
        }
        for (key, message) in &self.failures {
            write!(f, "\n  {key}: {message}")?;
        }
        Ok(())
    }
}

/// Drives a [`StageProcessor`] over the partitions of its source layer.
pub struct StageRunner<'a> {
    store: &'a PartitionedStore,
    state: &'a dyn StateStore,
    workers: usize,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> StageRunner<'a> {
    /// Sequential runner.
    pub fn new(store: &'a PartitionedStore, state: &'a dyn StateStore) -> Self {
        Self {
            store,
            state,
            workers: 1,
            cancel: None,
        }
    }

    /// Processes up to `workers` partitions concurrently.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Stops starting new partitions once `flag` is set.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Runs `stage` over every source partition matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error (see [`ErrorKind::is_fatal`]) or a
    /// listing failure. Partition-level failures are reported in the summary.
    pub fn run(&self, stage: &dyn StageProcessor, filter: &PartitionFilter) -> Result<RunSummary> {
        let mut summary = RunSummary::new(stage.name());
        tracing::info!(stage = stage.name(), workers = self.workers, "stage started");

        if self.workers <= 1 {
            for key in self.store.list_partitions(stage.source(), filter) {
                let key = key?;
                match self.process_one(stage, &key) {
                    PartitionOutcome::Failed(e) if e.kind().is_fatal() => {
                        tracing::error!(stage = stage.name(), partition = %key, error = %e, "fatal error, aborting");
                        return Err(e);
                    }
                    outcome => summary.record(key, outcome),
                }
            }
        } else {
            let keys = self.store.partitions(stage.source(), filter)?;
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(|e| PipelineError::Io(io::Error::other(e.to_string())))?;
            let abort = AtomicBool::new(false);
            let outcomes: Vec<(PartitionKey, PartitionOutcome)> = pool.install(|| {
                keys.into_par_iter()
                    .map(|key| {
                        if abort.load(Ordering::Relaxed) {
                            return (key, PartitionOutcome::Cancelled);
                        }
                        let outcome = self.process_one(stage, &key);
                        if matches!(&outcome, PartitionOutcome::Failed(e) if e.kind().is_fatal()) {
                            abort.store(true, Ordering::Relaxed);
                        }
                        (key, outcome)
                    })
                    .collect()
            });
            for (key, outcome) in outcomes {
                match outcome {
                    PartitionOutcome::Failed(e) if e.kind().is_fatal() => {
                        tracing::error!(stage = stage.name(), partition = %key, error = %e, "fatal error, aborting");
                        return Err(e);
                    }
                    outcome => summary.record(key, outcome),
                }
            }
        }

        tracing::info!(
            stage = stage.name(),
            processed = summary.processed,
            unchanged = summary.unchanged,
            failed = summary.failed(),
            "stage finished"
        );
        Ok(summary)
    }

    /// Processes one partition under its lock.
    pub fn process_one(&self, stage: &dyn StageProcessor, key: &PartitionKey) -> PartitionOutcome {
        if self.cancelled() {
            return PartitionOutcome::Cancelled;
        }
        let _lock = match self.store.lock_partition(stage.name(), key) {
            Ok(guard) => guard,
            Err(PipelineError::PartitionLocked(_)) => {
                tracing::warn!(stage = stage.name(), partition = %key, "partition locked, skipping");
                return PartitionOutcome::Locked;
            }
            Err(e) => return PartitionOutcome::Failed(e),
        };
        match self.try_process(stage, key) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(stage = stage.name(), partition = %key, error = %e, "partition failed");
                if !e.kind().is_fatal() {
                    if let Err(state_err) = self.state.record_failure(stage.name(), key) {
                        tracing::warn!(stage = stage.name(), partition = %key, error = %state_err, "could not record failure");
                    }
                }
                PartitionOutcome::Failed(e)
            }
        }
    }

    fn try_process(&self, stage: &dyn StageProcessor, key: &PartitionKey) -> Result<PartitionOutcome> {
        let name = stage.name();
        let source = match self.store.read_bytes(stage.source(), key, stage.source_file()) {
            Err(PipelineError::NotFound(what)) => return Err(PipelineError::corrupt(key, format!("missing {what}"))),
            other => other?,
        };
        let watermark = Watermark::compute(&source, &stage.params(key)?);
        if self.state.get_watermark(name, key)?.as_ref() == Some(&watermark) && self.store.exists(stage.target(), key) {
            tracing::debug!(stage = name, partition = %key, "unchanged, skipping");
            return Ok(PartitionOutcome::Unchanged);
        }

        self.state.mark_pending(name, key)?;
        let output = stage.process(key, &source)?;
        self.store.write_files(stage.target(), key, &output.files)?;
        self.state.commit(name, key, &watermark).map_err(|e| match e {
            PipelineError::StateUnavailable(_) | PipelineError::StateCommitFailure { .. } => e,
            other => PipelineError::StateCommitFailure {
                stage: name.to_string(),
                partition: key.to_string(),
                reason: other.to_string(),
            },
        })?;

        for d in &output.drift {
            tracing::warn!(stage = name, partition = %key, column = %d.column, detail = %d.detail, "schema drift");
        }
        tracing::info!(stage = name, partition = %key, records = output.records, "partition committed");
        Ok(PartitionOutcome::Processed {
            records: output.records,
            drift: !output.drift.is_empty(),
        })
    }
}
