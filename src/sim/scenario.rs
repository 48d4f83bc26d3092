//! Immutable scenario runs and their persisted manifests.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ScenarioConfig, SensorConfig};
use crate::error::{PipelineError, Result};
use crate::models::{
    CombinationRule, CurveShape, DeficitModel, FarmLayout, GeoReference, PowerCurve, TurbineType,
    WakeModel, WindParams,
};
use crate::sim::clock::Clock;
use crate::store::PartitionedStore;
use crate::store::atomic::atomic_write;

/// What to do when a scenario run is submitted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunPolicy {
    /// Refuse with [`PipelineError::RunExists`].
    Reject,
    /// Remove the run's partitions and regenerate deterministically.
    Overwrite,
}

impl RerunPolicy {
    /// Parses `"reject"` or `"overwrite"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reject" => Some(Self::Reject),
            "overwrite" => Some(Self::Overwrite),
            _ => None,
        }
    }
}

impl fmt::Display for RerunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reject => "reject",
            Self::Overwrite => "overwrite",
        })
    }
}

/// One complete simulated configuration, fixed once built.
///
/// Serialized as the run manifest under `_runs/<sim_run_id>.json`. Silver
/// reads it for the tick length its gap rule is relative to; Gold reads it for
/// rated capacity, expected tick counts and the no-wake power recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    /// Scenario run identifier.
    pub sim_run_id: String,
    /// First tick.
    pub start: DateTime<Utc>,
    /// Whole hours simulated.
    pub duration_hours: u32,
    /// Seconds between ticks; divides 3600.
    pub tick_seconds: u32,
    /// Rerun policy.
    pub rerun_policy: RerunPolicy,
    /// Seed of the wind field.
    pub wind_seed: u64,
    /// Seed of the sensor model.
    pub telemetry_seed: u64,
    /// Farm layout, including per-turbine power curves.
    pub layout: FarmLayout,
    /// Ambient wind parameters.
    pub wind: WindParams,
    /// Wake interaction model.
    pub wake: WakeModel,
    /// Sensor defect model.
    pub sensor: SensorConfig,
}

impl ScenarioRun {
    /// Validates `config` and builds the run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] with every validation error.
    pub fn from_config(config: &ScenarioConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(PipelineError::Configuration(errors));
        }
        let start = config.start_time()?;
        let s = &config.scenario;

        let tb = &config.turbine;
        let shape = match tb.curve.as_str() {
            "table" => CurveShape::Table {
                points: tb.table.iter().map(|p| (p[0], p[1])).collect(),
            },
            _ => CurveShape::Cubic,
        };
        let kind = TurbineType {
            rotor_diameter_m: tb.rotor_diameter_m,
            hub_height_m: tb.hub_height_m,
            power_curve: PowerCurve {
                shape,
                ..PowerCurve::cubic(tb.rated_power_kw, tb.cut_in_mps, tb.rated_mps, tb.cut_out_mps)
            },
        };

        let farm = &config.farm;
        let origin = GeoReference {
            latitude_deg: farm.latitude_deg,
            longitude_deg: farm.longitude_deg,
        };
        let layout = if farm.turbines.is_empty() {
            FarmLayout::grid(&farm.farm_id, origin, farm.rows, farm.cols, farm.spacing_m, &kind)
        } else {
            let positions: Vec<_> = farm.turbines.iter().map(|t| (t.id.clone(), t.x_m, t.y_m)).collect();
            FarmLayout::from_positions(&farm.farm_id, origin, &positions, &kind)
        };

        let w = &config.wind;
        let wind = WindParams {
            base_speed_mps: w.base_speed_mps,
            daily_amplitude_mps: w.daily_variation_mps,
            peak_hour: w.peak_hour,
            turbulence_alpha: w.turbulence_alpha,
            turbulence_std_mps: w.turbulence_std_mps,
            base_direction_deg: w.base_direction_deg,
            direction_std_deg: w.direction_std_deg,
            reference_height_m: w.reference_height_m,
            shear_exponent: w.shear_exponent,
            air_density: w.air_density,
        };

        let wk = &config.wake;
        let combination = CombinationRule::parse(&wk.combination).unwrap_or(CombinationRule::SumOfSquares);
        let wake = match wk.model.as_str() {
            "jensen" => WakeModel::new(
                DeficitModel::Jensen {
                    thrust_coefficient: wk.thrust_coefficient,
                    decay_constant: wk.decay_constant,
                },
                combination,
            ),
            "gaussian" => WakeModel::new(
                DeficitModel::Gaussian {
                    strength: wk.strength,
                    decay_length_m: wk.decay_length_m,
                    crosswind_sigma_m: wk.crosswind_sigma_m,
                    cutoff: wk.cutoff,
                },
                combination,
            ),
            _ => WakeModel {
                combination,
                ..WakeModel::none()
            },
        };

        Ok(Self {
            sim_run_id: s.sim_run_id.clone(),
            start,
            duration_hours: s.duration_hours,
            tick_seconds: s.tick_seconds,
            rerun_policy: RerunPolicy::parse(&s.rerun_policy).unwrap_or(RerunPolicy::Reject),
            wind_seed: s.wind_seed,
            telemetry_seed: s.telemetry_seed,
            layout,
            wind,
            wake,
            sensor: config.sensor.clone(),
        })
    }

    /// Clock over the whole run.
    pub fn clock(&self) -> Clock {
        Clock::for_hours(self.start, self.tick_seconds, self.duration_hours)
    }

    /// Ticks per full hour.
    pub fn ticks_per_hour(&self) -> u32 {
        3600 / self.tick_seconds.max(1)
    }

    /// Tick length in hours.
    pub fn tick_hours(&self) -> f64 {
        f64::from(self.tick_seconds) / 3600.0
    }

    /// Expected ticks of one turbine inside the hour starting at `hour_start`.
    ///
    /// Less than [`ScenarioRun::ticks_per_hour`] only when the run starts or
    /// ends mid-hour.
    pub fn expected_ticks(&self, hour_start: DateTime<Utc>) -> u32 {
        let step = i64::from(self.tick_seconds.max(1));
        let run_start = self.start.timestamp();
        let run_end = run_start + i64::from(self.duration_hours) * 3600;
        let from = hour_start.timestamp().max(run_start);
        let to = (hour_start.timestamp() + 3600).min(run_end);
        if to <= from {
            return 0;
        }
        // First tick at or after `from`, on the run's tick grid.
        let first = run_start + (from - run_start + step - 1) / step * step;
        if first >= to {
            0
        } else {
            u32::try_from((to - 1 - first) / step + 1).unwrap_or(u32::MAX)
        }
    }

    /// Path of this run's manifest.
    pub fn manifest_path(store: &PartitionedStore, sim_run_id: &str) -> PathBuf {
        store.runs_dir().join(format!("{sim_run_id}.json"))
    }

    /// Atomically writes the manifest.
    ///
    /// # Errors
    ///
    /// Returns a JSON or I/O error.
    pub fn save(&self, store: &PartitionedStore) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(&Self::manifest_path(store, &self.sim_run_id), &json)?;
        Ok(())
    }

    /// Loads a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingRunManifest`] if none exists.
    pub fn load(store: &PartitionedStore, sim_run_id: &str) -> Result<Self> {
        match fs::read(Self::manifest_path(store, sim_run_id)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PipelineError::MissingRunManifest(sim_run_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a manifest exists for `sim_run_id`.
    pub fn exists(store: &PartitionedStore, sim_run_id: &str) -> bool {
        Self::manifest_path(store, sim_run_id).is_file()
    }
}

/// Run manifests of one store, loaded once per scenario run.
#[derive(Debug)]
pub struct RunManifests {
    store: PartitionedStore,
    runs: Mutex<HashMap<String, Arc<ScenarioRun>>>,
}

impl RunManifests {
    /// Empty cache over `store`.
    pub fn new(store: PartitionedStore) -> Self {
        Self {
            store,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Manifest of `sim_run_id`, loaded on first use.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingRunManifest`] if none exists.
    pub fn get(&self, sim_run_id: &str) -> Result<Arc<ScenarioRun>> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(run) = runs.get(sim_run_id) {
            return Ok(Arc::clone(run));
        }
        let run = Arc::new(ScenarioRun::load(&self.store, sim_run_id)?);
        runs.insert(sim_run_id.to_string(), Arc::clone(&run));
        Ok(run)
    }
}
