//! Bronze to Silver: deduplication and data-quality flagging.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use serde::Serialize;

use super::{StageOutput, StageProcessor};
use crate::config::QualityConfig;
use crate::error::{PipelineError, Result};
use crate::records::{CleanedRecord, QualityFlag, RawTelemetryRecord, SensorQualityCode};
use crate::sim::RunManifests;
use crate::store::codec::{self, PartitionTable};
use crate::store::{Layer, PartitionKey, PartitionedStore, SchemaDrift};

/// Cleans Bronze telemetry partitions into Silver.
///
/// The gap rule is relative to each run's tick length, read from its manifest.
#[derive(Debug)]
pub struct SilverProcessor {
    quality: QualityConfig,
    manifests: RunManifests,
}

/// Everything besides the source bytes that shapes a cleaned partition.
#[derive(Serialize)]
struct CleaningParams<'a> {
    quality: &'a QualityConfig,
    tick_seconds: u32,
}

impl SilverProcessor {
    /// Stage name.
    pub const STAGE: &'static str = "silver";

    /// Processor with the given thresholds, reading run manifests from `store`.
    pub fn new(store: PartitionedStore, quality: QualityConfig) -> Self {
        Self {
            quality,
            manifests: RunManifests::new(store),
        }
    }

    /// Thresholds in use.
    pub fn quality(&self) -> &QualityConfig {
        &self.quality
    }
}

impl StageProcessor for SilverProcessor {
    fn name(&self) -> &'static str {
        Self::STAGE
    }

    fn source(&self) -> Layer {
        Layer::Bronze
    }

    fn target(&self) -> Layer {
        Layer::Silver
    }

    fn source_file(&self) -> &'static str {
        RawTelemetryRecord::FILE_NAME
    }

    fn params(&self, key: &PartitionKey) -> Result<Vec<u8>> {
        let params = CleaningParams {
            quality: &self.quality,
            tick_seconds: self.manifests.get(&key.sim_run_id)?.tick_seconds,
        };
        Ok(serde_json::to_vec(&params)?)
    }

    fn process(&self, key: &PartitionKey, source: &Bytes) -> Result<StageOutput> {
        let tick_seconds = self.manifests.get(&key.sim_run_id)?.tick_seconds;
        let decoded = codec::decode::<RawTelemetryRecord>(source, &key.to_string())?;
        let cleaned = clean(key, decoded.rows, &decoded.drift, &self.quality, tick_seconds)?;
        Ok(StageOutput {
            files: vec![(CleanedRecord::FILE_NAME, codec::encode(&cleaned)?)],
            records: cleaned.len(),
            drift: decoded.drift,
        })
    }
}

/// Deduplicates and flags one partition's raw records.
///
/// Output is sorted by `(turbine_id, timestamp)` and depends only on the input
/// set: for each `(sim_run_id, turbine_id, timestamp)` the record with the
/// highest `ingest_seq` survives (the later row on a tie).
///
/// Consecutive samples of a turbine further apart than `tick_seconds` plus
/// the configured gap tolerance mark the later one `TIME_GAP` and
/// `MISSING_INTERPOLATED`. The same distance bounds interpolation neighbours.
///
/// # Errors
///
/// Returns [`PipelineError::SourcePartitionCorrupt`] if a record does not
/// belong to `key`.
pub fn clean(
    key: &PartitionKey,
    rows: Vec<RawTelemetryRecord>,
    drift: &[SchemaDrift],
    quality: &QualityConfig,
    tick_seconds: u32,
) -> Result<Vec<CleanedRecord>> {
    let max_step_ms = (i64::from(tick_seconds) + i64::from(quality.gap_tolerance_seconds)) * 1000;
    if let Some(stray) = rows
        .iter()
        .find(|r| r.sim_run_id != key.sim_run_id || r.farm_id != key.farm_id || !key.contains(r.timestamp))
    {
        return Err(PipelineError::corrupt(
            key,
            format!(
                "record ({}, {}, {}) does not belong to the partition",
                stray.sim_run_id, stray.turbine_id, stray.timestamp
            ),
        ));
    }

    // (turbine_id, timestamp) -> (survivor, copies); sim_run_id is fixed per partition.
    let mut survivors: BTreeMap<(String, i64), (RawTelemetryRecord, usize)> = BTreeMap::new();
    for row in rows {
        let k = (row.turbine_id.clone(), row.timestamp.timestamp_millis());
        match survivors.get_mut(&k) {
            Some((kept, copies)) => {
                *copies += 1;
                if row.ingest_seq >= kept.ingest_seq {
                    *kept = row;
                }
            }
            None => {
                survivors.insert(k, (row, 1));
            }
        }
    }

    let mut out = Vec::with_capacity(survivors.len());
    let mut turbine: Vec<(RawTelemetryRecord, usize)> = Vec::new();
    let mut entries = survivors.into_values().peekable();
    while let Some(entry) = entries.next() {
        let last = entries.peek().is_none_or(|(next, _)| next.turbine_id != entry.0.turbine_id);
        turbine.push(entry);
        if last {
            flag_turbine(std::mem::take(&mut turbine), drift, quality, max_step_ms, &mut out);
        }
    }
    Ok(out)
}

/// Usable value: present, physically plausible, from a non-faulted sensor.
fn usable(value: Option<f64>, code: SensorQualityCode, lo: f64, hi: f64) -> Option<f64> {
    value.filter(|v| v.is_finite() && (lo..=hi).contains(v) && code != SensorQualityCode::Fault)
}

fn out_of_range(value: Option<f64>, lo: f64, hi: f64) -> bool {
    value.is_some_and(|v| !(lo..=hi).contains(&v))
}

/// Linear interpolation of field `pick` at index `i` from the nearest usable
/// neighbours on both sides, each within `max_step_ms`.
fn interpolate(
    series: &[(RawTelemetryRecord, usize)],
    i: usize,
    max_step_ms: i64,
    pick: impl Fn(&RawTelemetryRecord) -> Option<f64>,
) -> Option<(i64, f64, i64, f64)> {
    let t = series[i].0.timestamp.timestamp_millis();
    let near = |r: &RawTelemetryRecord| (r.timestamp.timestamp_millis() - t).abs() <= max_step_ms;
    let before = series[..i]
        .iter()
        .rev()
        .take_while(|(r, _)| near(r))
        .find_map(|(r, _)| pick(r).map(|v| (r.timestamp.timestamp_millis(), v)))?;
    let after = series[i + 1..]
        .iter()
        .take_while(|(r, _)| near(r))
        .find_map(|(r, _)| pick(r).map(|v| (r.timestamp.timestamp_millis(), v)))?;
    Some((before.0, before.1, after.0, after.1))
}

fn lerp(t: i64, (t0, v0, t1, v1): (i64, f64, i64, f64)) -> f64 {
    if t1 == t0 {
        return v0;
    }
    v0 + (v1 - v0) * (t - t0) as f64 / (t1 - t0) as f64
}

/// Interpolates a direction along the shorter arc.
fn lerp_direction(t: i64, (t0, v0, t1, v1): (i64, f64, i64, f64)) -> f64 {
    let delta = (v1 - v0 + 540.0).rem_euclid(360.0) - 180.0;
    lerp(t, (t0, v0, t1, v0 + delta)).rem_euclid(360.0)
}

fn flag_turbine(
    series: Vec<(RawTelemetryRecord, usize)>,
    drift: &[SchemaDrift],
    q: &QualityConfig,
    max_step_ms: i64,
    out: &mut Vec<CleanedRecord>,
) {
    let speed = |r: &RawTelemetryRecord, v: Option<f64>| usable(v, r.sensor_quality_code, q.wind_speed_min_mps, q.wind_speed_max_mps);

    for i in 0..series.len() {
        let (raw, copies) = &series[i];
        let mut record = raw.clone();
        let mut flags = BTreeSet::new();
        if *copies > 1 {
            flags.insert(QualityFlag::DuplicateRemoved);
        }
        match record.sensor_quality_code {
            SensorQualityCode::Good => {}
            SensorQualityCode::Degraded => {
                flags.insert(QualityFlag::SensorDegraded);
            }
            SensorQualityCode::Fault => {
                flags.insert(QualityFlag::SensorFault);
            }
        }
        if !drift.is_empty() {
            flags.insert(QualityFlag::SchemaMismatch);
        }
        if i > 0 {
            let gap = record.timestamp - series[i - 1].0.timestamp;
            if gap.num_milliseconds() > max_step_ms {
                flags.insert(QualityFlag::TimeGap);
                flags.insert(QualityFlag::MissingInterpolated);
            }
        }

        let bad_range = out_of_range(record.ambient_wind_speed, q.wind_speed_min_mps, q.wind_speed_max_mps)
            || out_of_range(record.effective_wind_speed, q.wind_speed_min_mps, q.wind_speed_max_mps)
            || out_of_range(record.ambient_wind_dir, q.wind_dir_min_deg, q.wind_dir_max_deg)
            || out_of_range(record.power_output, q.power_min_kw, q.power_max_kw)
            || out_of_range(record.rotor_speed_rpm, q.rotor_speed_min_rpm, q.rotor_speed_max_rpm)
            || out_of_range(record.yaw_deg, q.yaw_min_deg, q.yaw_max_deg)
            || [
                record.ambient_wind_speed,
                record.effective_wind_speed,
                record.ambient_wind_dir,
                record.power_output,
                record.rotor_speed_rpm,
                record.yaw_deg,
            ]
            .iter()
            .any(|v| v.is_some_and(|x| !x.is_finite()));
        if bad_range {
            flags.insert(QualityFlag::OutOfRange);
        }

        let t = record.timestamp.timestamp_millis();
        let mut missing = false;
        let mut interpolated = false;
        let mut fill = |slot: &mut Option<f64>, value: Option<f64>| {
            if slot.is_none() {
                match value {
                    Some(v) => {
                        *slot = Some(v);
                        interpolated = true;
                    }
                    None => missing = true,
                }
            }
        };
        fill(
            &mut record.ambient_wind_speed,
            interpolate(&series, i, max_step_ms, |r| speed(r, r.ambient_wind_speed)).map(|p| lerp(t, p)),
        );
        fill(
            &mut record.effective_wind_speed,
            interpolate(&series, i, max_step_ms, |r| speed(r, r.effective_wind_speed)).map(|p| lerp(t, p)),
        );
        fill(
            &mut record.ambient_wind_dir,
            interpolate(&series, i, max_step_ms, |r| {
                usable(r.ambient_wind_dir, r.sensor_quality_code, q.wind_dir_min_deg, q.wind_dir_max_deg)
            })
            .map(|p| lerp_direction(t, p)),
        );
        fill(
            &mut record.power_output,
            interpolate(&series, i, max_step_ms, |r| {
                usable(r.power_output, r.sensor_quality_code, q.power_min_kw, q.power_max_kw)
            })
            .map(|p| lerp(t, p)),
        );
        if missing {
            flags.insert(QualityFlag::MissingValue);
        } else if interpolated {
            flags.insert(QualityFlag::MissingInterpolated);
        }

        out.push(CleanedRecord::new(record, flags));
    }
}
