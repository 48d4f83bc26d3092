//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;
use walkdir::WalkDir;
use wind_farm_twin::config::{QualityConfig, ScenarioConfig};
use wind_farm_twin::pipeline::{GoldAggregator, RunSummary, SilverProcessor, StageRunner};
use wind_farm_twin::sim::{ScenarioRun, SimulationEngine, SimulationSummary};
use wind_farm_twin::state::{StateEntry, StateStore, Watermark};
use wind_farm_twin::store::{Layer, PartitionKey, PartitionFilter, PartitionedStore};
use wind_farm_twin::{PipelineError, Result};

/// Preset shortened to `hours` hours at one-minute ticks (12 turbines).
pub fn small_scenario(preset: &str, hours: u32) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::from_preset(preset).expect("preset");
    cfg.scenario.duration_hours = hours;
    cfg.scenario.tick_seconds = 60;
    cfg
}

/// Saves a manifest for a hand-written run `sim_run_id` with `tick_seconds` ticks.
pub fn save_manifest(store: &PartitionedStore, sim_run_id: &str, tick_seconds: u32) -> ScenarioRun {
    let mut cfg = ScenarioConfig::no_wake();
    cfg.scenario.sim_run_id = sim_run_id.to_string();
    cfg.scenario.tick_seconds = tick_seconds;
    let run = ScenarioRun::from_config(&cfg).expect("scenario run");
    run.save(store).expect("save manifest");
    run
}

/// Empty data lake in a temporary directory.
pub fn lake() -> (TempDir, PartitionedStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = PartitionedStore::new(dir.path());
    (dir, store)
}

/// Simulates `cfg` into Bronze.
pub fn simulate(store: &PartitionedStore, cfg: &ScenarioConfig) -> SimulationSummary {
    let run = ScenarioRun::from_config(cfg).expect("scenario run");
    SimulationEngine::new(store).run(&run).expect("simulation")
}

/// Runs Silver over every Bronze partition.
pub fn run_silver(store: &PartitionedStore, state: &dyn StateStore, workers: usize) -> RunSummary {
    StageRunner::new(store, state)
        .with_workers(workers)
        .run(&SilverProcessor::new(store.clone(), QualityConfig::default()), &PartitionFilter::all())
        .expect("silver stage")
}

/// Runs Gold over every Silver partition.
pub fn run_gold(store: &PartitionedStore, state: &dyn StateStore, workers: usize) -> RunSummary {
    StageRunner::new(store, state)
        .with_workers(workers)
        .run(&GoldAggregator::new(store.clone()), &PartitionFilter::all())
        .expect("gold stage")
}

/// Every file under `layer`, keyed by its path relative to the layer root.
pub fn snapshot(store: &PartitionedStore, layer: Layer) -> BTreeMap<PathBuf, Vec<u8>> {
    let root = store.layer_dir(layer);
    WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(&root).expect("under root").to_path_buf();
            let bytes = fs::read(e.path()).expect("read file");
            (rel, bytes)
        })
        .collect()
}

/// Committed watermarks of `stage`, keyed by entry key.
pub fn watermarks(state: &dyn StateStore, stage: &str) -> BTreeMap<String, Option<Watermark>> {
    state
        .entries(stage)
        .expect("state entries")
        .into_iter()
        .map(|(k, e): (String, StateEntry)| (k, e.watermark))
        .collect()
}

/// Wraps a state store and fails commits of one hour while armed.
pub struct FailingStateStore<S> {
    inner: S,
    fail_hour: u8,
    armed: AtomicBool,
}

impl<S: StateStore> FailingStateStore<S> {
    pub fn new(inner: S, fail_hour: u8) -> Self {
        Self {
            inner,
            fail_hour,
            armed: AtomicBool::new(true),
        }
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StateStore> StateStore for FailingStateStore<S> {
    fn get_watermark(&self, stage: &str, key: &PartitionKey) -> Result<Option<Watermark>> {
        self.inner.get_watermark(stage, key)
    }

    fn mark_pending(&self, stage: &str, key: &PartitionKey) -> Result<()> {
        self.inner.mark_pending(stage, key)
    }

    fn commit(&self, stage: &str, key: &PartitionKey, watermark: &Watermark) -> Result<()> {
        if self.armed.load(Ordering::SeqCst) && key.hour == self.fail_hour {
            return Err(PipelineError::StateCommitFailure {
                stage: stage.to_string(),
                partition: key.to_string(),
                reason: "injected commit failure".to_string(),
            });
        }
        self.inner.commit(stage, key, watermark)
    }

    fn record_failure(&self, stage: &str, key: &PartitionKey) -> Result<()> {
        self.inner.record_failure(stage, key)
    }

    fn entries(&self, stage: &str) -> Result<BTreeMap<String, StateEntry>> {
        self.inner.entries(stage)
    }
}
