//! Simulation engine: wind field, wake model and power curve per tick,
//! written to Bronze one hour partition at a time.

use std::fmt;

use crate::error::{PipelineError, Result};
use crate::models::WindField;
use crate::records::RawTelemetryRecord;
use crate::store::{Layer, PartitionFilter, PartitionKey, PartitionedStore};

use super::scenario::{RerunPolicy, ScenarioRun};
use super::sensor::{Measurement, Observation, SensorModel, TrueState};

/// Totals of one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    /// Scenario run.
    pub sim_run_id: String,
    /// Ticks simulated.
    pub ticks: usize,
    /// Bronze partitions written.
    pub partitions: usize,
    /// Records written, retransmissions included.
    pub records: usize,
    /// Records lost to sensor dropout.
    pub dropped: usize,
    /// Retransmitted duplicates.
    pub duplicates: usize,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation {} ===", self.sim_run_id)?;
        writeln!(f, "Ticks:                 {}", self.ticks)?;
        writeln!(f, "Bronze partitions:     {}", self.partitions)?;
        writeln!(f, "Records written:       {}", self.records)?;
        writeln!(f, "Dropped (dropout):     {}", self.dropped)?;
        write!(f, "Duplicates (retx):     {}", self.duplicates)
    }
}

/// Accumulates one hour of records and hands it to the sink.
struct HourBatch {
    key: Option<PartitionKey>,
    rows: Vec<RawTelemetryRecord>,
    retransmit: Vec<RawTelemetryRecord>,
    next_seq: u64,
}

impl HourBatch {
    fn push(&mut self, mut record: RawTelemetryRecord) {
        record.ingest_seq = self.next_seq;
        self.next_seq += 1;
        self.rows.push(record);
    }

    /// Emits the buffered hour; retransmissions arrive after every original.
    fn flush<F>(&mut self, summary: &mut SimulationSummary, sink: &mut F) -> Result<()>
    where
        F: FnMut(PartitionKey, Vec<RawTelemetryRecord>) -> Result<()>,
    {
        let Some(key) = self.key.take() else {
            return Ok(());
        };
        for record in std::mem::take(&mut self.retransmit) {
            self.push(record);
        }
        let rows = std::mem::take(&mut self.rows);
        summary.partitions += 1;
        summary.records += rows.len();
        sink(key, rows)
    }
}

/// Produces the full telemetry of `run`, one hour partition at a time.
///
/// Each tick samples the wind field, scales it to every hub height, applies
/// the wake model and the power curve, then passes the true state through the
/// sensor model. Records of an hour are handed to `sink` in ingestion order
/// once the hour is complete. Output depends only on `run`.
///
/// # Errors
///
/// Returns [`PipelineError::WakeModelDivergence`] on the first negative or
/// non-finite effective wind speed, or the first error of `sink`. Hours
/// already handed to `sink` stay written.
pub fn simulate<F>(run: &ScenarioRun, mut sink: F) -> Result<SimulationSummary>
where
    F: FnMut(PartitionKey, Vec<RawTelemetryRecord>) -> Result<()>,
{
    let field = WindField::new(run.wind.clone(), run.wind_seed);
    let mut sensor = SensorModel::new(run.sensor.clone(), run.telemetry_seed);
    let turbines = &run.layout.turbines;
    let farm_id = &run.layout.farm_id;
    let air_density = run.wind.air_density;

    let mut summary = SimulationSummary {
        sim_run_id: run.sim_run_id.clone(),
        ..SimulationSummary::default()
    };
    let mut batch = HourBatch {
        key: None,
        rows: Vec::with_capacity(run.ticks_per_hour() as usize * turbines.len()),
        retransmit: Vec::new(),
        next_seq: 0,
    };
    let mut ambient = vec![0.0; turbines.len()];

    for sample in field.samples(run.clock()) {
        let key = PartitionKey::for_timestamp(&run.sim_run_id, farm_id, sample.timestamp);
        if batch.key.as_ref() != Some(&key) {
            batch.flush(&mut summary, &mut sink)?;
            batch.key = Some(key);
        }
        summary.ticks += 1;

        for (slot, t) in ambient.iter_mut().zip(turbines) {
            *slot = field.at_hub_height(sample.speed_mps, t.hub_height_m);
        }
        let effective = run.wake.effective_speeds(turbines, &ambient, sample.direction_deg);

        for ((t, &amb), &eff) in turbines.iter().zip(&ambient).zip(&effective) {
            if !eff.is_finite() || eff < 0.0 {
                return Err(PipelineError::WakeModelDivergence {
                    sim_run_id: run.sim_run_id.clone(),
                    turbine_id: t.turbine_id.clone(),
                    timestamp: sample.timestamp,
                    effective_wind_speed: eff,
                });
            }
            let op = t.power_curve.operate(eff, air_density);
            // The nacelle tracks the ambient wind direction.
            let state = TrueState {
                ambient_wind_speed: amb,
                ambient_wind_dir: sample.direction_deg,
                effective_wind_speed: eff,
                power_output: op.power_kw,
                rotor_speed_rpm: op.rotor_speed_rpm,
                yaw_deg: sample.direction_deg,
                status: op.status,
            };
            let record = |m: Measurement| RawTelemetryRecord {
                sim_run_id: run.sim_run_id.clone(),
                farm_id: farm_id.clone(),
                turbine_id: t.turbine_id.clone(),
                timestamp: sample.timestamp,
                ingest_seq: 0,
                ambient_wind_speed: m.ambient_wind_speed,
                ambient_wind_dir: m.ambient_wind_dir,
                effective_wind_speed: m.effective_wind_speed,
                power_output: m.power_output,
                rotor_speed_rpm: m.rotor_speed_rpm,
                yaw_deg: m.yaw_deg,
                turbine_status: Some(m.turbine_status),
                sensor_quality_code: m.sensor_quality_code,
            };
            match sensor.observe(state) {
                Observation::Dropped => summary.dropped += 1,
                Observation::Delivered(m) => batch.push(record(m)),
                Observation::Duplicated(m) => {
                    summary.duplicates += 1;
                    batch.push(record(m));
                    batch.retransmit.push(record(m));
                }
            }
        }
    }
    batch.flush(&mut summary, &mut sink)?;
    Ok(summary)
}

/// Runs scenarios against a partitioned store.
#[derive(Debug, Clone, Copy)]
pub struct SimulationEngine<'a> {
    store: &'a PartitionedStore,
}

impl<'a> SimulationEngine<'a> {
    /// Creates an engine writing to `store`.
    pub fn new(store: &'a PartitionedStore) -> Self {
        Self { store }
    }

    /// Whether `sim_run_id` already has a manifest or Bronze partitions.
    pub fn run_exists(&self, sim_run_id: &str) -> bool {
        ScenarioRun::exists(self.store, sim_run_id)
            || self
                .store
                .list_partitions(Layer::Bronze, &PartitionFilter::run(sim_run_id))
                .next()
                .is_some()
    }

    /// Simulates `run` into Bronze.
    ///
    /// The manifest is written before the first partition. An existing run is
    /// rejected or, under [`RerunPolicy::Overwrite`], removed from every layer
    /// first so no partition of the previous run survives.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RunExists`], a divergence, or a storage error.
    pub fn run(&self, run: &ScenarioRun) -> Result<SimulationSummary> {
        let id = &run.sim_run_id;
        if self.run_exists(id) {
            match run.rerun_policy {
                RerunPolicy::Reject => return Err(PipelineError::RunExists(id.clone())),
                RerunPolicy::Overwrite => {
                    tracing::info!(sim_run_id = %id, "overwriting existing scenario run");
                    self.remove_run(id)?;
                }
            }
        }
        run.save(self.store)?;
        tracing::info!(
            sim_run_id = %id,
            turbines = run.layout.turbines.len(),
            hours = run.duration_hours,
            wake = run.wake.is_enabled(),
            "simulation started"
        );

        let summary = simulate(run, |key, rows| {
            self.store.write(Layer::Bronze, &key, &rows)?;
            tracing::info!(sim_run_id = %id, partition = %key, records = rows.len(), "bronze partition written");
            Ok(())
        })
        .inspect_err(|e| tracing::error!(sim_run_id = %id, error = %e, "simulation aborted"))?;

        tracing::info!(
            sim_run_id = %id,
            partitions = summary.partitions,
            records = summary.records,
            "simulation finished"
        );
        Ok(summary)
    }

    fn remove_run(&self, sim_run_id: &str) -> Result<()> {
        let filter = PartitionFilter::run(sim_run_id);
        for layer in [Layer::Bronze, Layer::Silver, Layer::Gold] {
            for key in self.store.partitions(layer, &filter)? {
                self.store.remove(layer, &key)?;
            }
        }
        Ok(())
    }
}
