//! End-to-end tests of simulation, Silver, Gold and the incremental runner.

mod common;

use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::AtomicBool;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use wind_farm_twin::ErrorKind;
use wind_farm_twin::config::{QualityConfig, SensorConfig};
use wind_farm_twin::models::TurbineStatus;
use wind_farm_twin::pipeline::{GoldAggregator, SilverProcessor, StageRunner};
use wind_farm_twin::records::{
    CleanedRecord, FarmKpiRecord, HourlyEnergyRecord, QualityFlag, RawTelemetryRecord,
    SensorQualityCode,
};
use wind_farm_twin::report::ComparisonReport;
use wind_farm_twin::sim::ScenarioRun;
use wind_farm_twin::state::{FileStateStore, MemoryStateStore, ProcessingStatus, StateStore, entry_key};
use wind_farm_twin::store::{Layer, PartitionFilter, PartitionKey, PartitionTable};

fn hour_key(sim_run_id: &str, hour: u8) -> PartitionKey {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
    PartitionKey::new(sim_run_id, "F001", date, hour)
}

fn at(key: &PartitionKey, second: i64) -> DateTime<Utc> {
    key.hour_start() + chrono::Duration::seconds(second)
}

fn raw(key: &PartitionKey, turbine: &str, second: i64, seq: u64, power: f64) -> RawTelemetryRecord {
    RawTelemetryRecord {
        sim_run_id: key.sim_run_id.clone(),
        farm_id: key.farm_id.clone(),
        turbine_id: turbine.to_string(),
        timestamp: at(key, second),
        ingest_seq: seq,
        ambient_wind_speed: Some(9.0),
        ambient_wind_dir: Some(220.0),
        effective_wind_speed: Some(9.0),
        power_output: Some(power),
        rotor_speed_rpm: Some(13.0),
        yaw_deg: Some(220.0),
        turbine_status: Some(TurbineStatus::Running),
        sensor_quality_code: SensorQualityCode::Good,
    }
}

#[test]
fn simulation_is_deterministic() {
    let cfg = common::small_scenario("wake", 2);
    let (_a, lake_a) = common::lake();
    let (_b, lake_b) = common::lake();
    let first = common::simulate(&lake_a, &cfg);
    let second = common::simulate(&lake_b, &cfg);

    assert_eq!(first, second);
    assert_eq!(first.partitions, 2);
    assert_eq!(
        common::snapshot(&lake_a, Layer::Bronze),
        common::snapshot(&lake_b, Layer::Bronze),
        "Bronze bytes must match for the same configuration"
    );
}

#[test]
fn second_run_is_a_no_op() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("wake", 3));
    let state = FileStateStore::open(store.state_dir()).expect("state");

    let silver = common::run_silver(&store, &state, 1);
    let gold = common::run_gold(&store, &state, 1);
    assert_eq!((silver.processed, gold.processed), (3, 3));

    let silver_bytes = common::snapshot(&store, Layer::Silver);
    let gold_bytes = common::snapshot(&store, Layer::Gold);
    let state_bytes = fs::read(state.stage_path("silver")).expect("state file");

    let silver = common::run_silver(&store, &state, 1);
    let gold = common::run_gold(&store, &state, 1);
    assert_eq!(silver.processed, 0);
    assert_eq!(silver.unchanged, 3);
    assert_eq!(gold.processed, 0);
    assert_eq!(gold.unchanged, 3);
    assert_eq!(common::snapshot(&store, Layer::Silver), silver_bytes);
    assert_eq!(common::snapshot(&store, Layer::Gold), gold_bytes);
    assert_eq!(fs::read(state.stage_path("silver")).expect("state file"), state_bytes);
}

#[test]
fn duplicates_keep_the_latest_ingest() {
    let (_dir, store) = common::lake();
    common::save_manifest(&store, "SIM-T", 10);
    let key = hour_key("SIM-T", 0);
    let rows = vec![
        raw(&key, "T001", 0, 0, 900.0),
        raw(&key, "T001", 60, 1, 910.0),
        raw(&key, "T001", 0, 2, 950.0),
        raw(&key, "T002", 0, 3, 800.0),
    ];
    store.write(Layer::Bronze, &key, &rows).expect("write bronze");

    let state = MemoryStateStore::new();
    let summary = common::run_silver(&store, &state, 1);
    assert!(summary.is_success());

    let cleaned = store.read::<CleanedRecord>(Layer::Silver, &key).expect("silver").rows;
    assert_eq!(cleaned.len(), 3);
    let keys: BTreeSet<_> = cleaned.iter().map(|r| (r.record.turbine_id.clone(), r.record.timestamp)).collect();
    assert_eq!(keys.len(), cleaned.len(), "(turbine_id, timestamp) is unique");

    let survivor = &cleaned[0];
    assert_eq!(survivor.record.turbine_id, "T001");
    assert_eq!(survivor.record.ingest_seq, 2);
    assert_eq!(survivor.record.power_output, Some(950.0));
    assert!(survivor.quality_flags.contains(&QualityFlag::DuplicateRemoved));
    assert!(!cleaned[1].quality_flags.contains(&QualityFlag::DuplicateRemoved));
}

#[test]
fn simulated_silver_has_unique_keys() {
    let (_dir, store) = common::lake();
    let mut cfg = common::small_scenario("no_wake", 2);
    cfg.sensor.duplicate_prob = 0.05;
    let sim = common::simulate(&store, &cfg);
    assert!(sim.duplicates > 0);

    common::run_silver(&store, &MemoryStateStore::new(), 1);
    let cleaned = store
        .read_all::<CleanedRecord>(Layer::Silver, &PartitionFilter::all())
        .expect("silver");
    let keys: BTreeSet<_> = cleaned.iter().map(|r| (r.record.turbine_id.clone(), r.record.timestamp)).collect();
    assert_eq!(keys.len(), cleaned.len());
    assert_eq!(cleaned.len(), sim.records - sim.duplicates);
}

#[test]
fn failed_commit_recovers_to_the_clean_result() {
    let cfg = common::small_scenario("wake", 3);

    let (_base_dir, baseline) = common::lake();
    common::simulate(&baseline, &cfg);
    let baseline_state = FileStateStore::open(baseline.state_dir()).expect("state");
    common::run_silver(&baseline, &baseline_state, 1);
    common::run_gold(&baseline, &baseline_state, 1);

    let (_dir, store) = common::lake();
    common::simulate(&store, &cfg);
    let state = common::FailingStateStore::new(FileStateStore::open(store.state_dir()).expect("state"), 1);

    let first = common::run_silver(&store, &state, 1);
    assert_eq!(first.processed, 2);
    assert_eq!(first.failed(), 1);
    assert_eq!(first.failures_by_kind.get(&ErrorKind::StateCommitFailure), Some(&1));
    assert!(!first.is_success());

    let failed_key = entry_key("silver", &hour_key("SIM-B", 1));
    let entry = state.entries("silver").expect("entries").remove(&failed_key).expect("entry");
    assert_eq!(entry.status, ProcessingStatus::Failed);
    assert_eq!(entry.watermark, None);

    state.disarm();
    let retry = common::run_silver(&store, &state, 1);
    assert_eq!(retry.processed, 1, "only the uncommitted partition is redone");
    assert_eq!(retry.unchanged, 2);
    common::run_gold(&store, &state, 1);

    assert_eq!(common::snapshot(&store, Layer::Silver), common::snapshot(&baseline, Layer::Silver));
    assert_eq!(common::snapshot(&store, Layer::Gold), common::snapshot(&baseline, Layer::Gold));
    assert_eq!(
        common::watermarks(state.inner(), "silver"),
        common::watermarks(&baseline_state, "silver")
    );
    assert_eq!(
        common::watermarks(state.inner(), "gold"),
        common::watermarks(&baseline_state, "gold")
    );
}

#[test]
fn wake_scenario_loses_energy_against_baseline() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 2));
    common::simulate(&store, &common::small_scenario("wake", 2));
    let state = MemoryStateStore::new();
    common::run_silver(&store, &state, 2);
    common::run_gold(&store, &state, 2);

    let kpis = store
        .read_all::<FarmKpiRecord>(Layer::Gold, &PartitionFilter::all())
        .expect("farm kpis");
    let (a_hours, b_hours): (Vec<_>, Vec<_>) = kpis.iter().partition(|k| k.sim_run_id == "SIM-A");
    assert_eq!((a_hours.len(), b_hours.len()), (2, 2));
    for k in &a_hours {
        assert_eq!(k.wake_loss_pct, 0.0, "SIM-A hour {} has wake loss", k.hour);
        assert_eq!(k.avg_wake_loss_mps, 0.0, "SIM-A hour {} has a wind deficit", k.hour);
    }
    for k in b_hours.iter().filter(|k| k.no_wake_energy_kwh > 0.0) {
        assert!(k.wake_loss_pct > 0.0, "SIM-B hour {} has no wake loss", k.hour);
        assert!(k.avg_wake_loss_mps > 0.0, "SIM-B hour {} has no wind deficit", k.hour);
    }
    assert!(b_hours.iter().any(|k| k.no_wake_energy_kwh > 0.0));

    let report = ComparisonReport::load(&store, &PartitionFilter::all()).expect("report");
    let a = report.run("SIM-A").expect("SIM-A totals");
    let b = report.run("SIM-B").expect("SIM-B totals");
    assert_eq!(a.hours, 2);
    assert_eq!(b.hours, 2);
    assert!(a.wake_loss_pct.abs() < 1e-9, "no wake, no loss: {}", a.wake_loss_pct);
    assert!(b.wake_loss_pct > 0.0, "wake loss should be positive: {}", b.wake_loss_pct);
    assert!(b.total_energy_kwh < a.total_energy_kwh);
}

#[test]
fn gold_energy_matches_clean_telemetry() {
    let (_dir, store) = common::lake();
    let mut cfg = common::small_scenario("wake", 2);
    cfg.sensor.enabled = false;
    common::simulate(&store, &cfg);
    let state = MemoryStateStore::new();
    common::run_silver(&store, &state, 1);
    common::run_gold(&store, &state, 1);

    let run = ScenarioRun::load(&store, "SIM-B").expect("manifest");
    let tick_h = run.tick_hours();
    for key in store.partitions(Layer::Gold, &PartitionFilter::all()).expect("gold partitions") {
        let bronze = store.read::<RawTelemetryRecord>(Layer::Bronze, &key).expect("bronze").rows;
        let hourly = store.read::<HourlyEnergyRecord>(Layer::Gold, &key).expect("hourly").rows;
        let kpi = store.read::<FarmKpiRecord>(Layer::Gold, &key).expect("kpi").rows;
        assert_eq!(hourly.len(), 12);
        assert_eq!(kpi.len(), 1);

        for h in &hourly {
            let expected: f64 = bronze
                .iter()
                .filter(|r| r.turbine_id == h.turbine_id)
                .map(|r| r.power_output.unwrap_or(0.0) * tick_h)
                .sum();
            assert!((h.energy_kwh - expected).abs() < 1e-6, "{}: {} vs {expected}", h.turbine_id, h.energy_kwh);
            assert_eq!(h.valid_record_count, 60);
            assert_eq!(h.expected_record_count, 60);
            assert!((h.power_kw_avg - expected / tick_h / 60.0).abs() < 1e-6);
            let stopped = bronze
                .iter()
                .filter(|r| r.turbine_id == h.turbine_id && r.turbine_status != Some(TurbineStatus::Running))
                .count();
            assert_eq!(h.downtime_minutes, stopped as f64, "one-minute ticks");
        }
        let total: f64 = hourly.iter().map(|h| h.energy_kwh).sum();
        assert!((kpi[0].total_energy_kwh - total).abs() < 1e-6);
        assert_eq!(kpi[0].availability, 1.0);
        assert_eq!(kpi[0].turbine_count, 12);
        assert_eq!(kpi[0].data_quality_score, 1.0);
        assert_eq!(kpi[0].bad_row_rate, 0.0);
    }
}

#[test]
fn clean_minute_ticks_carry_no_gap_flags() {
    let (_dir, store) = common::lake();
    let mut cfg = common::small_scenario("no_wake", 1);
    cfg.sensor.enabled = false;
    common::simulate(&store, &cfg);
    let state = MemoryStateStore::new();
    common::run_silver(&store, &state, 1);
    common::run_gold(&store, &state, 1);

    let cleaned = store
        .read_all::<CleanedRecord>(Layer::Silver, &PartitionFilter::all())
        .expect("silver");
    assert_eq!(cleaned.len(), 720);
    assert!(cleaned.iter().all(|r| r.quality_flags.is_empty()), "clean telemetry is unflagged");
    let kpi = store.read_all::<FarmKpiRecord>(Layer::Gold, &PartitionFilter::all()).expect("kpi");
    assert_eq!(kpi.len(), 1);
    assert_eq!(kpi[0].data_quality_score, 1.0);
}

#[test]
fn dropouts_mark_the_following_sample() {
    let (_dir, store) = common::lake();
    let mut cfg = common::small_scenario("no_wake", 2);
    cfg.sensor = SensorConfig {
        dropout_prob: 0.05,
        missing_value_prob: 0.0,
        negative_wind_prob: 0.0,
        power_spike_prob: 0.0,
        duplicate_prob: 0.0,
        degraded_prob: 0.0,
        fault_prob: 0.0,
        ..SensorConfig::default()
    };
    let sim = common::simulate(&store, &cfg);
    assert!(sim.dropped > 0);
    common::run_silver(&store, &MemoryStateStore::new(), 1);

    let mut gaps = 0;
    for key in store.partitions(Layer::Silver, &PartitionFilter::all()).expect("silver partitions") {
        let cleaned = store.read::<CleanedRecord>(Layer::Silver, &key).expect("silver").rows;
        for pair in cleaned.windows(2).filter(|w| w[0].record.turbine_id == w[1].record.turbine_id) {
            let step = (pair[1].record.timestamp - pair[0].record.timestamp).num_seconds();
            let flags = &pair[1].quality_flags;
            if step > 60 {
                gaps += 1;
                assert!(flags.contains(&QualityFlag::MissingInterpolated), "{key} {}", pair[1].record.timestamp);
                assert!(flags.contains(&QualityFlag::TimeGap));
                assert!(pair[1].is_valid);
            } else {
                assert!(flags.is_empty(), "{key} {}: {flags:?}", pair[1].record.timestamp);
            }
        }
    }
    assert!(gaps > 0);
}

fn parquet_bytes(batch: &arrow::record_batch::RecordBatch) -> Bytes {
    let mut buf = Vec::new();
    let mut writer = parquet::arrow::ArrowWriter::try_new(&mut buf, batch.schema(), None).expect("writer");
    writer.write(batch).expect("write batch");
    writer.close().expect("close writer");
    Bytes::from(buf)
}

#[test]
fn extra_column_is_flagged_as_schema_mismatch() {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    let (_dir, store) = common::lake();
    common::save_manifest(&store, "SIM-T", 10);
    let key = hour_key("SIM-T", 0);
    let rows = vec![raw(&key, "T001", 0, 0, 900.0), raw(&key, "T001", 10, 1, 905.0)];
    let batch = RawTelemetryRecord::to_batch(&rows).expect("batch");

    let mut fields: Vec<Field> = batch.schema().fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new("nacelle_temp_c", DataType::Float64, true));
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(Float64Array::from(vec![Some(12.5), Some(12.6)])));
    let widened = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).expect("widened batch");
    store
        .write_files(Layer::Bronze, &key, &[(RawTelemetryRecord::FILE_NAME, parquet_bytes(&widened))])
        .expect("write bronze");

    let summary = common::run_silver(&store, &MemoryStateStore::new(), 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.schema_drift, 1);
    assert!(summary.is_success());

    let cleaned = store.read::<CleanedRecord>(Layer::Silver, &key).expect("silver").rows;
    assert_eq!(cleaned.len(), 2);
    for r in &cleaned {
        assert!(r.quality_flags.contains(&QualityFlag::SchemaMismatch));
        assert!(r.is_valid, "schema mismatch alone does not invalidate");
    }
}

#[test]
fn older_file_without_optional_columns_still_cleans() {
    let (_dir, store) = common::lake();
    common::save_manifest(&store, "SIM-T", 10);
    let key = hour_key("SIM-T", 0);
    let rows = vec![raw(&key, "T001", 0, 0, 900.0), raw(&key, "T001", 10, 1, 905.0)];
    let batch = RawTelemetryRecord::to_batch(&rows).expect("batch");
    let ingest_seq = batch.schema().index_of("ingest_seq").expect("column");
    let code = batch.schema().index_of("sensor_quality_code").expect("column");
    let keep: Vec<usize> = (0..batch.num_columns()).filter(|i| *i != ingest_seq && *i != code).collect();
    let older = batch.project(&keep).expect("projection");
    store
        .write_files(Layer::Bronze, &key, &[(RawTelemetryRecord::FILE_NAME, parquet_bytes(&older))])
        .expect("write bronze");

    let summary = common::run_silver(&store, &MemoryStateStore::new(), 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.schema_drift, 0);

    let cleaned = store.read::<CleanedRecord>(Layer::Silver, &key).expect("silver").rows;
    assert_eq!(cleaned.len(), 2);
    assert!(cleaned.iter().all(|r| r.record.sensor_quality_code == SensorQualityCode::Good));
    assert!(cleaned.iter().all(|r| r.quality_flags.is_empty()));
}

#[test]
fn locked_partition_is_skipped_not_failed() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 2));
    let state = MemoryStateStore::new();
    let key = hour_key("SIM-A", 1);

    let guard = store.lock_partition(SilverProcessor::STAGE, &key).expect("lock");
    let summary = common::run_silver(&store, &state, 1);
    assert_eq!(summary.locked, 1);
    assert_eq!(summary.processed, 1);
    assert!(summary.is_success());
    assert!(!store.exists(Layer::Silver, &key));
    drop(guard);

    let summary = common::run_silver(&store, &state, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.unchanged, 1);
    assert!(store.exists(Layer::Silver, &key));
}

#[test]
fn corrupt_partition_does_not_stop_siblings() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 3));
    let bad = hour_key("SIM-A", 1);
    store
        .write_files(Layer::Bronze, &bad, &[(RawTelemetryRecord::FILE_NAME, Bytes::from_static(b"not parquet"))])
        .expect("overwrite bronze");

    let state = MemoryStateStore::new();
    let silver = common::run_silver(&store, &state, 1);
    assert_eq!(silver.processed, 2);
    assert_eq!(silver.failed(), 1);
    assert_eq!(silver.failures_by_kind.get(&ErrorKind::SourcePartitionCorrupt), Some(&1));
    assert_eq!(silver.failures[0].0, bad);
    let entries = state.entries("silver").expect("entries");
    assert_eq!(entries[&entry_key("silver", &bad)].status, ProcessingStatus::Failed);

    let gold = common::run_gold(&store, &state, 1);
    assert_eq!(gold.processed, 2);
    assert!(gold.is_success());
}

#[test]
fn parallel_workers_match_sequential_output() {
    let cfg = common::small_scenario("wake", 4);
    let (_a, seq) = common::lake();
    let (_b, par) = common::lake();
    common::simulate(&seq, &cfg);
    common::simulate(&par, &cfg);
    let seq_state = MemoryStateStore::new();
    let par_state = FileStateStore::open(par.state_dir()).expect("state");

    let s1 = common::run_silver(&seq, &seq_state, 1);
    let p1 = common::run_silver(&par, &par_state, 4);
    assert_eq!((s1.processed, s1.records), (p1.processed, p1.records));
    common::run_gold(&seq, &seq_state, 1);
    common::run_gold(&par, &par_state, 4);

    assert_eq!(common::snapshot(&seq, Layer::Silver), common::snapshot(&par, Layer::Silver));
    assert_eq!(common::snapshot(&seq, Layer::Gold), common::snapshot(&par, Layer::Gold));
    assert_eq!(common::watermarks(&seq_state, "gold"), common::watermarks(&par_state, "gold"));
}

#[test]
fn changed_source_reprocesses_only_that_partition() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("wake", 3));
    let state = FileStateStore::open(store.state_dir()).expect("state");
    common::run_silver(&store, &state, 1);
    common::run_gold(&store, &state, 1);

    let key = hour_key("SIM-B", 2);
    let mut rows = store.read::<RawTelemetryRecord>(Layer::Bronze, &key).expect("bronze").rows;
    rows[0].power_output = Some(0.0);
    store.write(Layer::Bronze, &key, &rows).expect("rewrite bronze");

    let silver = common::run_silver(&store, &state, 1);
    assert_eq!((silver.processed, silver.unchanged), (1, 2));
    let gold = common::run_gold(&store, &state, 1);
    assert_eq!((gold.processed, gold.unchanged), (1, 2));
}

#[test]
fn changed_thresholds_reprocess_everything() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 2));
    let state = MemoryStateStore::new();
    common::run_silver(&store, &state, 1);

    let stricter = QualityConfig {
        power_max_kw: 1500.0,
        ..QualityConfig::default()
    };
    let summary = StageRunner::new(&store, &state)
        .run(&SilverProcessor::new(store.clone(), stricter), &PartitionFilter::all())
        .expect("silver");
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.unchanged, 0);
}

#[test]
fn missing_manifest_fails_only_that_run() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 1));
    common::simulate(&store, &common::small_scenario("wake", 1));
    let state = MemoryStateStore::new();
    common::run_silver(&store, &state, 1);
    fs::remove_file(ScenarioRun::manifest_path(&store, "SIM-A")).expect("remove manifest");

    let gold = common::run_gold(&store, &state, 1);
    assert_eq!(gold.processed, 1);
    assert_eq!(gold.failed(), 1);
    assert_eq!(gold.failures[0].0.sim_run_id, "SIM-A");
}

#[test]
fn silver_without_manifest_fails_only_that_run() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 1));
    common::simulate(&store, &common::small_scenario("wake", 1));
    fs::remove_file(ScenarioRun::manifest_path(&store, "SIM-B")).expect("remove manifest");

    let silver = common::run_silver(&store, &MemoryStateStore::new(), 1);
    assert_eq!(silver.processed, 1);
    assert_eq!(silver.failed(), 1);
    assert_eq!(silver.failures[0].0.sim_run_id, "SIM-B");
    assert_eq!(silver.failures_by_kind.get(&ErrorKind::SourcePartitionCorrupt), Some(&1));
}

#[test]
fn cancelled_runner_starts_nothing() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 2));
    let state = MemoryStateStore::new();
    let cancel = AtomicBool::new(true);

    let summary = StageRunner::new(&store, &state)
        .with_cancel(&cancel)
        .run(&GoldAggregator::new(store.clone()), &PartitionFilter::all())
        .expect("gold");
    assert_eq!(summary.processed, 0);

    let summary = StageRunner::new(&store, &state)
        .with_cancel(&cancel)
        .run(&SilverProcessor::new(store.clone(), QualityConfig::default()), &PartitionFilter::all())
        .expect("silver");
    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.processed, 0);
    assert!(state.entries("silver").expect("entries").is_empty());
}

#[test]
fn filter_limits_the_partitions_processed() {
    let (_dir, store) = common::lake();
    common::simulate(&store, &common::small_scenario("no_wake", 2));
    common::simulate(&store, &common::small_scenario("wake", 2));
    let state = MemoryStateStore::new();

    let summary = StageRunner::new(&store, &state)
        .run(&SilverProcessor::new(store.clone(), QualityConfig::default()), &PartitionFilter::run("SIM-B"))
        .expect("silver");
    assert_eq!(summary.processed, 2);
    assert!(store.partitions(Layer::Silver, &PartitionFilter::run("SIM-A")).expect("list").is_empty());
}
