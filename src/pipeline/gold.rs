//! Silver to Gold: hourly turbine energy and farm KPIs.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::{StageOutput, StageProcessor};
use crate::error::Result;
use crate::models::TurbineStatus;
use crate::records::{CleanedRecord, FarmKpiRecord, HourlyEnergyRecord, QualityFlag};
use crate::sim::{RunManifests, ScenarioRun};
use crate::store::codec::{self, PartitionTable};
use crate::store::{Layer, PartitionKey, PartitionedStore};

/// Aggregates Silver partitions into the two Gold tables.
///
/// Run manifests are loaded once per scenario run and cached for the
/// lifetime of the aggregator.
#[derive(Debug)]
pub struct GoldAggregator {
    manifests: RunManifests,
}

impl GoldAggregator {
    /// Stage name.
    pub const STAGE: &'static str = "gold";

    /// Aggregator reading run manifests from `store`.
    pub fn new(store: PartitionedStore) -> Self {
        Self {
            manifests: RunManifests::new(store),
        }
    }
}

impl StageProcessor for GoldAggregator {
    fn name(&self) -> &'static str {
        Self::STAGE
    }

    fn source(&self) -> Layer {
        Layer::Silver
    }

    fn target(&self) -> Layer {
        Layer::Gold
    }

    fn source_file(&self) -> &'static str {
        CleanedRecord::FILE_NAME
    }

    fn params(&self, key: &PartitionKey) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self.manifests.get(&key.sim_run_id)?.as_ref())?)
    }

    fn process(&self, key: &PartitionKey, source: &Bytes) -> Result<StageOutput> {
        let decoded = codec::decode::<CleanedRecord>(source, &key.to_string())?;
        let run = self.manifests.get(&key.sim_run_id)?;
        let (hourly, kpi) = aggregate(key, &decoded.rows, &run);
        Ok(StageOutput {
            records: hourly.len() + 1,
            files: vec![
                (HourlyEnergyRecord::FILE_NAME, codec::encode(&hourly)?),
                (FarmKpiRecord::FILE_NAME, codec::encode(std::slice::from_ref(&kpi))?),
            ],
            drift: decoded.drift,
        })
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

/// Computes the Gold rows of one partition.
///
/// Every turbine of the manifest gets an hourly row, with zero valid samples
/// if it reported nothing. Energy integrates the power of valid samples over
/// the tick length. Wake loss compares measured power with the power curve on
/// ambient wind over valid samples not flagged `MISSING_INTERPOLATED`.
/// The mean wind deficit uses the same sample set as wake loss.
/// Downtime counts every sample whose controller state is stopped or cut out,
/// valid or not, since the state does not come from the faulty sensor.
pub fn aggregate(
    key: &PartitionKey,
    cleaned: &[CleanedRecord],
    run: &ScenarioRun,
) -> (Vec<HourlyEnergyRecord>, FarmKpiRecord) {
    let expected = run.expected_ticks(key.hour_start());
    let tick_h = run.tick_hours();
    let tick_minutes = f64::from(run.tick_seconds) / 60.0;
    let air_density = run.wind.air_density;

    let mut by_turbine: BTreeMap<&str, Vec<&CleanedRecord>> = BTreeMap::new();
    for r in cleaned {
        by_turbine.entry(r.record.turbine_id.as_str()).or_default().push(r);
    }

    let mut hourly = Vec::with_capacity(run.layout.turbines.len());
    let (mut actual_kwh, mut no_wake_kwh) = (0.0, 0.0);
    for turbine in &run.layout.turbines {
        let records = by_turbine.remove(turbine.turbine_id.as_str()).unwrap_or_default();
        let mut energy_kwh = 0.0;
        let mut valid = 0u32;
        let (mut power_sum, mut wind_sum, mut wind_n) = (0.0, 0.0, 0u32);
        let down = records
            .iter()
            .filter(|r| matches!(r.record.turbine_status, Some(TurbineStatus::Stopped | TurbineStatus::CutOut)))
            .count();
        for r in records.iter().filter(|r| r.is_valid) {
            let power = r.record.power_output.unwrap_or(0.0).max(0.0);
            energy_kwh += power * tick_h;
            power_sum += power;
            valid += 1;
            if let Some(v) = r.record.effective_wind_speed {
                wind_sum += v;
                wind_n += 1;
            }
            if r.quality_flags.contains(&QualityFlag::MissingInterpolated) {
                continue;
            }
            if let Some(ambient) = r.record.ambient_wind_speed {
                actual_kwh += power * tick_h;
                no_wake_kwh += turbine.power_curve.power_kw(ambient, air_density) * tick_h;
            }
        }
        hourly.push(HourlyEnergyRecord {
            sim_run_id: key.sim_run_id.clone(),
            farm_id: key.farm_id.clone(),
            turbine_id: turbine.turbine_id.clone(),
            date: key.date,
            hour: key.hour,
            energy_kwh,
            valid_record_count: valid.min(expected),
            expected_record_count: expected,
            wind_speed_mps_avg: ratio(wind_sum, f64::from(wind_n)),
            power_kw_avg: ratio(power_sum, f64::from(valid)),
            downtime_minutes: down as f64 * tick_minutes,
        });
    }
    for unknown in by_turbine.keys() {
        tracing::debug!(partition = %key, turbine_id = unknown, "turbine not in run manifest, ignored");
    }

    let total_energy_kwh: f64 = hourly.iter().map(|h| h.energy_kwh).sum();
    let valid_total: u32 = hourly.iter().map(|h| h.valid_record_count).sum();
    let expected_total: u32 = hourly.iter().map(|h| h.expected_record_count).sum();
    let hours = f64::from(expected) * tick_h;
    let unflagged = cleaned.iter().filter(|r| r.is_valid && r.quality_flags.is_empty()).count();
    let invalid = cleaned.iter().filter(|r| !r.is_valid).count();
    let deficits: Vec<f64> = cleaned
        .iter()
        .filter(|r| r.is_valid && !r.quality_flags.contains(&QualityFlag::MissingInterpolated))
        .filter_map(|r| Some(r.record.ambient_wind_speed? - r.record.effective_wind_speed?))
        .collect();

    let kpi = FarmKpiRecord {
        sim_run_id: key.sim_run_id.clone(),
        farm_id: key.farm_id.clone(),
        date: key.date,
        hour: key.hour,
        total_energy_kwh,
        capacity_factor: ratio(total_energy_kwh, run.layout.rated_capacity_kw() * hours),
        availability: ratio(f64::from(valid_total), f64::from(expected_total)),
        wake_loss_pct: if no_wake_kwh > 0.0 { 1.0 - actual_kwh / no_wake_kwh } else { 0.0 },
        data_quality_score: ratio(unflagged as f64, cleaned.len() as f64),
        turbine_count: u32::try_from(run.layout.turbines.len()).unwrap_or(u32::MAX),
        no_wake_energy_kwh: no_wake_kwh,
        avg_wake_loss_mps: ratio(deficits.iter().sum(), deficits.len() as f64),
        bad_row_rate: ratio(invalid as f64, cleaned.len() as f64),
    };
    (hourly, kpi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;
    use crate::records::{RawTelemetryRecord, SensorQualityCode};
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeSet;

    fn run() -> ScenarioRun {
        let mut cfg = ScenarioConfig::wake();
        cfg.farm.rows = 1;
        cfg.farm.cols = 2;
        ScenarioRun::from_config(&cfg).expect("run")
    }

    fn key() -> PartitionKey {
        PartitionKey::new("SIM-B", "F001", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(), 0)
    }

    fn cleaned(turbine: &str, tick: i64, ambient: f64, power: f64, flags: &[QualityFlag]) -> CleanedRecord {
        CleanedRecord::new(
            RawTelemetryRecord {
                sim_run_id: "SIM-B".into(),
                farm_id: "F001".into(),
                turbine_id: turbine.into(),
                timestamp: key().hour_start() + Duration::seconds(tick * 10),
                ingest_seq: tick as u64,
                ambient_wind_speed: Some(ambient),
                ambient_wind_dir: Some(220.0),
                effective_wind_speed: Some(ambient),
                power_output: Some(power),
                rotor_speed_rpm: Some(if power > 0.0 { 12.0 } else { 0.0 }),
                yaw_deg: Some(220.0),
                turbine_status: Some(if power > 0.0 { TurbineStatus::Running } else { TurbineStatus::Stopped }),
                sensor_quality_code: SensorQualityCode::Good,
            },
            flags.iter().copied().collect::<BTreeSet<_>>(),
        )
    }

    #[test]
    fn constant_power_full_hour_is_one_hour_of_energy() {
        let run = run();
        let rows: Vec<_> = (0..360).map(|i| cleaned("T001", i, 20.0, 1500.0, &[])).collect();
        let (hourly, kpi) = aggregate(&key(), &rows, &run);
        assert_eq!(hourly.len(), 2);
        assert!((hourly[0].energy_kwh - 1500.0).abs() < 1e-6);
        assert_eq!(hourly[0].valid_record_count, 360);
        assert_eq!(hourly[0].expected_record_count, 360);
        assert_eq!(hourly[1].valid_record_count, 0, "silent turbine still reported");
        assert!((kpi.availability - 0.5).abs() < 1e-12);
        assert!((kpi.capacity_factor - 1500.0 / 4000.0).abs() < 1e-9);
        assert_eq!(kpi.turbine_count, 2);
        assert!((kpi.data_quality_score - 1.0).abs() < 1e-12);
        assert_eq!(hourly[0].power_kw_avg, 1500.0);
        assert_eq!(hourly[0].wind_speed_mps_avg, 20.0);
        assert_eq!(hourly[0].downtime_minutes, 0.0);
        assert_eq!(kpi.avg_wake_loss_mps, 0.0);
        assert_eq!(kpi.bad_row_rate, 0.0);
    }

    #[test]
    fn stopped_samples_count_as_downtime() {
        let run = run();
        let mut rows: Vec<_> = (0..30).map(|i| cleaned("T001", i, 2.0, 0.0, &[])).collect();
        rows.extend((30..360).map(|i| cleaned("T001", i, 9.0, 700.0, &[])));
        rows[0] = cleaned("T001", 0, 2.0, 0.0, &[QualityFlag::SensorFault]);
        let (hourly, kpi) = aggregate(&key(), &rows, &run);
        assert!((hourly[0].downtime_minutes - 5.0).abs() < 1e-9, "30 ticks of 10 s");
        assert_eq!(hourly[1].downtime_minutes, 0.0);
        let expected_avg = 330.0 * 700.0 / 359.0;
        assert!((hourly[0].power_kw_avg - expected_avg).abs() < 1e-9);
        assert!((kpi.bad_row_rate - 1.0 / 360.0).abs() < 1e-12);
    }

    #[test]
    fn wake_deficit_averages_ambient_minus_effective() {
        let run = run();
        let mut waked = cleaned("T002", 0, 9.0, 500.0, &[]);
        waked.record.effective_wind_speed = Some(8.0);
        let rows = vec![cleaned("T001", 0, 9.0, 700.0, &[]), waked];
        let (hourly, kpi) = aggregate(&key(), &rows, &run);
        assert!((kpi.avg_wake_loss_mps - 0.5).abs() < 1e-12);
        assert_eq!(hourly[1].wind_speed_mps_avg, 8.0);
    }

    #[test]
    fn wake_loss_compares_with_ambient_curve() {
        let run = run();
        let curve = &run.layout.turbines[0].power_curve;
        let free = curve.power_kw(9.0, None);
        let rows = vec![cleaned("T001", 0, 9.0, free, &[]), cleaned("T002", 0, 9.0, free / 2.0, &[])];
        let (_, kpi) = aggregate(&key(), &rows, &run);
        assert!((kpi.wake_loss_pct - 0.25).abs() < 1e-9);
        assert!((kpi.no_wake_energy_kwh - 2.0 * free / 360.0).abs() < 1e-9);

        let unwaked = vec![cleaned("T001", 0, 9.0, free, &[]), cleaned("T002", 0, 9.0, free, &[])];
        assert_eq!(aggregate(&key(), &unwaked, &run).1.wake_loss_pct, 0.0);
    }

    #[test]
    fn invalid_and_interpolated_samples() {
        let run = run();
        let rows = vec![
            cleaned("T001", 0, 9.0, 600.0, &[QualityFlag::OutOfRange]),
            cleaned("T001", 1, 9.0, 600.0, &[QualityFlag::MissingInterpolated]),
            cleaned("T001", 2, 9.0, 600.0, &[QualityFlag::SensorDegraded]),
        ];
        let (hourly, kpi) = aggregate(&key(), &rows, &run);
        assert_eq!(hourly[0].valid_record_count, 2);
        assert!((hourly[0].energy_kwh - 2.0 * 600.0 / 360.0).abs() < 1e-9);
        assert_eq!(kpi.data_quality_score, 0.0);
        let expected_no_wake = run.layout.turbines[0].power_curve.power_kw(9.0, None) / 360.0;
        assert!((kpi.no_wake_energy_kwh - expected_no_wake).abs() < 1e-9, "interpolated sample excluded");
    }

    #[test]
    fn empty_partition_yields_zero_kpis() {
        let (hourly, kpi) = aggregate(&key(), &[], &run());
        assert!(hourly.iter().all(|h| h.energy_kwh == 0.0 && h.valid_record_count == 0));
        assert_eq!(kpi.availability, 0.0);
        assert_eq!(kpi.wake_loss_pct, 0.0);
        assert_eq!(kpi.data_quality_score, 0.0);
    }
}
