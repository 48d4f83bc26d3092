//! Seeded sensor model: turns true turbine state into measured telemetry.
//!
//! Every call draws the same number of random values whatever the outcome,
//! so one defect never shifts the random stream of later records.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::SensorConfig;
use crate::models::TurbineStatus;
use crate::records::SensorQualityCode;

/// True state of one turbine at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrueState {
    /// Hub-height ambient wind speed (m/s).
    pub ambient_wind_speed: f64,
    /// Ambient wind direction (degrees).
    pub ambient_wind_dir: f64,
    /// Post-wake wind speed (m/s).
    pub effective_wind_speed: f64,
    /// Electrical power (kW).
    pub power_output: f64,
    /// Rotor speed (rpm).
    pub rotor_speed_rpm: f64,
    /// Nacelle yaw (degrees).
    pub yaw_deg: f64,
    /// Controller state.
    pub status: TurbineStatus,
}

/// What the sensor reports for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Ambient wind speed.
    pub ambient_wind_speed: Option<f64>,
    /// Ambient wind direction.
    pub ambient_wind_dir: Option<f64>,
    /// Measured effective wind speed.
    pub effective_wind_speed: Option<f64>,
    /// Measured power.
    pub power_output: Option<f64>,
    /// Measured rotor speed.
    pub rotor_speed_rpm: Option<f64>,
    /// Measured yaw.
    pub yaw_deg: Option<f64>,
    /// Controller state, passed through unchanged.
    pub turbine_status: TurbineStatus,
    /// Reported health.
    pub sensor_quality_code: SensorQualityCode,
}

impl From<TrueState> for Measurement {
    fn from(s: TrueState) -> Self {
        Self {
            ambient_wind_speed: Some(s.ambient_wind_speed),
            ambient_wind_dir: Some(s.ambient_wind_dir),
            effective_wind_speed: Some(s.effective_wind_speed),
            power_output: Some(s.power_output),
            rotor_speed_rpm: Some(s.rotor_speed_rpm),
            yaw_deg: Some(s.yaw_deg),
            turbine_status: s.status,
            sensor_quality_code: SensorQualityCode::Good,
        }
    }
}

/// Outcome of observing one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// The record never arrives.
    Dropped,
    /// One record arrives.
    Delivered(Measurement),
    /// The record arrives and is retransmitted later in the same hour.
    Duplicated(Measurement),
}

/// Seeded noise, dropout and defect injection.
///
/// # Examples
///
/// ```
/// use wind_farm_twin::config::SensorConfig;
/// use wind_farm_twin::models::TurbineStatus;
/// use wind_farm_twin::sim::sensor::{Observation, SensorModel, TrueState};
///
/// let clean = SensorConfig { enabled: false, ..SensorConfig::default() };
/// let mut sensor = SensorModel::new(clean, 123);
/// let state = TrueState {
///     ambient_wind_speed: 9.0,
///     ambient_wind_dir: 220.0,
///     effective_wind_speed: 8.1,
///     power_output: 750.0,
///     rotor_speed_rpm: 12.1,
///     yaw_deg: 220.0,
///     status: TurbineStatus::Running,
/// };
/// assert_eq!(sensor.observe(state), Observation::Delivered(state.into()));
/// ```
#[derive(Debug, Clone)]
pub struct SensorModel {
    config: SensorConfig,
    rng: StdRng,
}

impl SensorModel {
    /// Creates a sensor model seeded with `seed`.
    pub fn new(config: SensorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Observes one true state.
    pub fn observe(&mut self, state: TrueState) -> Observation {
        let dropout: f64 = self.rng.random();
        let measurement_draw: f64 = self.rng.random();
        let code_draw: f64 = self.rng.random();
        let duplicate: f64 = self.rng.random();

        let mut m = Measurement::from(state);
        let c = &self.config;
        if !c.enabled {
            return Observation::Delivered(m);
        }
        if dropout < c.dropout_prob {
            return Observation::Dropped;
        }

        // Measurement defects are mutually exclusive: one draw, stacked bands.
        let missing = c.missing_value_prob;
        let negative = missing + c.negative_wind_prob;
        let spike = negative + c.power_spike_prob;
        if measurement_draw < missing {
            m.effective_wind_speed = None;
            m.power_output = None;
        } else if measurement_draw < negative {
            m.effective_wind_speed = Some(c.negative_wind_mps);
        } else if measurement_draw < spike {
            m.power_output = Some(c.power_spike_kw);
        }

        m.sensor_quality_code = if code_draw < c.fault_prob {
            SensorQualityCode::Fault
        } else if code_draw < c.fault_prob + c.degraded_prob {
            SensorQualityCode::Degraded
        } else {
            SensorQualityCode::Good
        };

        if duplicate < c.duplicate_prob {
            Observation::Duplicated(m)
        } else {
            Observation::Delivered(m)
        }
    }
}
