//! TOML-based scenario and pipeline configuration, presets, and validation.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::wake::CombinationRule;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the wake-enabled scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::from_preset`] for the built-in comparison pair.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run identity, time range, seeds and rerun policy.
    #[serde(default)]
    pub scenario: RunConfig,
    /// Farm identity and layout.
    #[serde(default)]
    pub farm: FarmConfig,
    /// Turbine type shared by every position.
    #[serde(default)]
    pub turbine: TurbineConfig,
    /// Ambient wind field.
    #[serde(default)]
    pub wind: WindConfig,
    /// Wake interaction model.
    #[serde(default)]
    pub wake: WakeConfig,
    /// Sensor noise and defect injection.
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// Run identity and timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Scenario run identifier; top-level partition dimension.
    pub sim_run_id: String,
    /// Start instant, RFC 3339 (e.g. `"2024-01-01T00:00:00Z"`).
    pub start: String,
    /// Number of whole hours to simulate (must be > 0).
    pub duration_hours: u32,
    /// Seconds between ticks; must divide 3600.
    pub tick_seconds: u32,
    /// `"reject"` or `"overwrite"` when the run already exists.
    pub rerun_policy: String,
    /// Seed of the ambient wind field.
    pub wind_seed: u64,
    /// Seed of the sensor model.
    pub telemetry_seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sim_run_id: "SIM-001".to_string(),
            start: "2024-01-01T00:00:00Z".to_string(),
            duration_hours: 6,
            tick_seconds: 10,
            rerun_policy: "reject".to_string(),
            wind_seed: 42,
            telemetry_seed: 123,
        }
    }
}

/// Explicit turbine position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurbinePosition {
    /// Turbine identifier.
    pub id: String,
    /// Easting (m).
    pub x_m: f64,
    /// Northing (m).
    pub y_m: f64,
}

/// Farm identity and layout.
///
/// When `turbines` is non-empty it replaces the generated grid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FarmConfig {
    /// Farm identifier.
    pub farm_id: String,
    /// Latitude of the layout origin.
    pub latitude_deg: f64,
    /// Longitude of the layout origin.
    pub longitude_deg: f64,
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Grid spacing (m).
    pub spacing_m: f64,
    /// Explicit positions.
    pub turbines: Vec<TurbinePosition>,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            farm_id: "F001".to_string(),
            latitude_deg: 55.0,
            longitude_deg: 8.0,
            rows: 3,
            cols: 4,
            spacing_m: 600.0,
            turbines: Vec::new(),
        }
    }
}

/// Turbine type parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TurbineConfig {
    /// Rotor diameter (m).
    pub rotor_diameter_m: f64,
    /// Hub height (m).
    pub hub_height_m: f64,
    /// Rated power (kW).
    pub rated_power_kw: f64,
    /// Cut-in speed (m/s).
    pub cut_in_mps: f64,
    /// Rated speed (m/s).
    pub rated_mps: f64,
    /// Cut-out speed (m/s).
    pub cut_out_mps: f64,
    /// `"cubic"` or `"table"`.
    pub curve: String,
    /// `[speed_mps, power_kw]` points for the table curve.
    pub table: Vec<[f64; 2]>,
}

impl Default for TurbineConfig {
    fn default() -> Self {
        Self {
            rotor_diameter_m: 90.0,
            hub_height_m: 80.0,
            rated_power_kw: 2000.0,
            cut_in_mps: 3.0,
            rated_mps: 12.0,
            cut_out_mps: 25.0,
            curve: "cubic".to_string(),
            table: Vec::new(),
        }
    }
}

/// Ambient wind parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindConfig {
    /// Mean speed at reference height (m/s).
    pub base_speed_mps: f64,
    /// Daily sinusoid amplitude (m/s).
    pub daily_variation_mps: f64,
    /// UTC hour of the daily peak.
    pub peak_hour: f64,
    /// AR(1) correlation coefficient (0.0-1.0).
    pub turbulence_alpha: f64,
    /// Turbulence standard deviation (m/s).
    pub turbulence_std_mps: f64,
    /// Mean direction the wind blows from (degrees).
    pub base_direction_deg: f64,
    /// Direction standard deviation (degrees).
    pub direction_std_deg: f64,
    /// Reference height of the speeds above (m).
    pub reference_height_m: f64,
    /// Power-law shear exponent.
    pub shear_exponent: f64,
    /// Air density (kg/m³); absent means standard density.
    pub air_density: Option<f64>,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            base_speed_mps: 8.0,
            daily_variation_mps: 2.0,
            peak_hour: 15.0,
            turbulence_alpha: 0.9,
            turbulence_std_mps: 0.6,
            base_direction_deg: 220.0,
            direction_std_deg: 8.0,
            reference_height_m: 80.0,
            shear_exponent: 0.14,
            air_density: None,
        }
    }
}

/// Wake model parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WakeConfig {
    /// `"none"`, `"jensen"` or `"gaussian"`.
    pub model: String,
    /// `"linear"`, `"sum_of_squares"`, `"dominant"` or `"product"`.
    pub combination: String,
    /// Jensen thrust coefficient.
    pub thrust_coefficient: f64,
    /// Jensen wake decay constant.
    pub decay_constant: f64,
    /// Gaussian deficit at zero offset.
    pub strength: f64,
    /// Gaussian downstream decay length (m).
    pub decay_length_m: f64,
    /// Gaussian crosswind width (m).
    pub crosswind_sigma_m: f64,
    /// Gaussian deficits below this are ignored.
    pub cutoff: f64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            model: "gaussian".to_string(),
            combination: "sum_of_squares".to_string(),
            thrust_coefficient: 0.8,
            decay_constant: 0.075,
            strength: 0.18,
            decay_length_m: 900.0,
            crosswind_sigma_m: 250.0,
            cutoff: 1e-3,
        }
    }
}

/// Sensor defect probabilities, each drawn per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// Master switch; `false` emits clean telemetry.
    pub enabled: bool,
    /// Record never arrives.
    pub dropout_prob: f64,
    /// Wind speed measurement missing (null).
    pub missing_value_prob: f64,
    /// Wind speed replaced by `negative_wind_mps`.
    pub negative_wind_prob: f64,
    /// Power replaced by `power_spike_kw`.
    pub power_spike_prob: f64,
    /// Record retransmitted later in the hour.
    pub duplicate_prob: f64,
    /// Sensor reports DEGRADED.
    pub degraded_prob: f64,
    /// Sensor reports FAULT.
    pub fault_prob: f64,
    /// Injected impossible wind speed.
    pub negative_wind_mps: f64,
    /// Injected power spike.
    pub power_spike_kw: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dropout_prob: 0.001,
            missing_value_prob: 0.002,
            negative_wind_prob: 0.002,
            power_spike_prob: 0.0015,
            duplicate_prob: 0.002,
            degraded_prob: 0.005,
            fault_prob: 0.001,
            negative_wind_mps: -5.0,
            power_spike_kw: 99_999.0,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"scenario.tick_seconds"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    /// Creates an error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks an identifier that becomes a path segment or state key.
fn check_id(errors: &mut Vec<ConfigError>, field: &str, value: &str) {
    if value.is_empty() {
        errors.push(ConfigError::new(field, "must not be empty"));
    } else if value.contains(['/', '\\', '=', '|']) {
        errors.push(ConfigError::new(
            field,
            format!("\"{value}\" must not contain '/', '\\', '=' or '|'"),
        ));
    } else if value.starts_with(['.', '_']) {
        errors.push(ConfigError::new(
            field,
            format!("\"{value}\" must not start with '.' or '_'"),
        ));
    }
}

fn check_prob(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::new(field, "must be in [0.0, 1.0]"));
    }
}

fn check_positive(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(value > 0.0 && value.is_finite()) {
        errors.push(ConfigError::new(field, "must be > 0"));
    }
}

impl ScenarioConfig {
    /// SIM-A: wakes disabled.
    pub fn no_wake() -> Self {
        let mut cfg = Self::default();
        cfg.scenario.sim_run_id = "SIM-A".to_string();
        cfg.wake.model = "none".to_string();
        cfg
    }

    /// SIM-B: identical to SIM-A except for the Gaussian wake model.
    pub fn wake() -> Self {
        let mut cfg = Self::default();
        cfg.scenario.sim_run_id = "SIM-B".to_string();
        cfg.wake.model = "gaussian".to_string();
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["no_wake", "wake"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "no_wake" => Ok(Self::no_wake()),
            "wake" => Ok(Self::wake()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed start instant.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `scenario.start` is not RFC 3339.
    pub fn start_time(&self) -> Result<DateTime<Utc>, ConfigError> {
        DateTime::parse_from_rfc3339(&self.scenario.start)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                ConfigError::new(
                    "scenario.start",
                    format!("\"{}\" is not RFC 3339: {e}", self.scenario.start),
                )
            })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.scenario;
        check_id(&mut errors, "scenario.sim_run_id", &s.sim_run_id);
        if let Err(e) = self.start_time() {
            errors.push(e);
        }
        if s.duration_hours == 0 {
            errors.push(ConfigError::new("scenario.duration_hours", "must be > 0"));
        }
        if s.tick_seconds == 0 || 3600 % s.tick_seconds != 0 {
            errors.push(ConfigError::new(
                "scenario.tick_seconds",
                format!("must be > 0 and divide 3600, got {}", s.tick_seconds),
            ));
        }
        if s.rerun_policy != "reject" && s.rerun_policy != "overwrite" {
            errors.push(ConfigError::new(
                "scenario.rerun_policy",
                format!("must be \"reject\" or \"overwrite\", got \"{}\"", s.rerun_policy),
            ));
        }

        let farm = &self.farm;
        check_id(&mut errors, "farm.farm_id", &farm.farm_id);
        if farm.turbines.is_empty() {
            if farm.rows == 0 || farm.cols == 0 {
                errors.push(ConfigError::new("farm.rows", "grid must have rows > 0 and cols > 0"));
            }
            check_positive(&mut errors, "farm.spacing_m", farm.spacing_m);
        } else {
            let mut seen = std::collections::BTreeSet::new();
            for (i, t) in farm.turbines.iter().enumerate() {
                check_id(&mut errors, &format!("farm.turbines[{i}].id"), &t.id);
                if !seen.insert(t.id.as_str()) {
                    errors.push(ConfigError::new(
                        format!("farm.turbines[{i}].id"),
                        format!("duplicate turbine id \"{}\"", t.id),
                    ));
                }
            }
        }

        let tb = &self.turbine;
        check_positive(&mut errors, "turbine.rotor_diameter_m", tb.rotor_diameter_m);
        check_positive(&mut errors, "turbine.hub_height_m", tb.hub_height_m);
        check_positive(&mut errors, "turbine.rated_power_kw", tb.rated_power_kw);
        if !(tb.cut_in_mps >= 0.0 && tb.cut_in_mps < tb.rated_mps && tb.rated_mps < tb.cut_out_mps) {
            errors.push(ConfigError::new(
                "turbine.cut_in_mps",
                "must satisfy 0 <= cut_in_mps < rated_mps < cut_out_mps",
            ));
        }
        match tb.curve.as_str() {
            "cubic" => {}
            "table" => {
                let monotone = tb
                    .table
                    .windows(2)
                    .all(|w| w[1][0] > w[0][0] && w[1][1] >= w[0][1]);
                if tb.table.len() < 2 || !monotone {
                    errors.push(ConfigError::new(
                        "turbine.table",
                        "needs >= 2 points with increasing speed and non-decreasing power",
                    ));
                }
                if tb.table.iter().any(|p| p[1] < 0.0 || p[1] > tb.rated_power_kw) {
                    errors.push(ConfigError::new(
                        "turbine.table",
                        "power points must lie in [0, rated_power_kw]",
                    ));
                }
            }
            other => errors.push(ConfigError::new(
                "turbine.curve",
                format!("must be \"cubic\" or \"table\", got \"{other}\""),
            )),
        }

        let w = &self.wind;
        if !(w.base_speed_mps >= 0.0) {
            errors.push(ConfigError::new("wind.base_speed_mps", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&w.turbulence_alpha) {
            errors.push(ConfigError::new("wind.turbulence_alpha", "must be in [0.0, 1.0]"));
        }
        if w.turbulence_std_mps < 0.0 || w.direction_std_deg < 0.0 {
            errors.push(ConfigError::new("wind.turbulence_std_mps", "standard deviations must be >= 0"));
        }
        check_positive(&mut errors, "wind.reference_height_m", w.reference_height_m);
        if let Some(rho) = w.air_density {
            check_positive(&mut errors, "wind.air_density", rho);
        }

        let wk = &self.wake;
        match wk.model.as_str() {
            "none" => {}
            "jensen" => {
                if !(wk.thrust_coefficient > 0.0 && wk.thrust_coefficient < 1.0) {
                    errors.push(ConfigError::new("wake.thrust_coefficient", "must be in (0.0, 1.0)"));
                }
                check_positive(&mut errors, "wake.decay_constant", wk.decay_constant);
            }
            "gaussian" => {
                check_prob(&mut errors, "wake.strength", wk.strength);
                check_positive(&mut errors, "wake.decay_length_m", wk.decay_length_m);
                check_positive(&mut errors, "wake.crosswind_sigma_m", wk.crosswind_sigma_m);
                check_prob(&mut errors, "wake.cutoff", wk.cutoff);
            }
            other => errors.push(ConfigError::new(
                "wake.model",
                format!("must be \"none\", \"jensen\" or \"gaussian\", got \"{other}\""),
            )),
        }
        if CombinationRule::parse(&wk.combination).is_none() {
            errors.push(ConfigError::new(
                "wake.combination",
                format!(
                    "unknown rule \"{}\", available: {}",
                    wk.combination,
                    CombinationRule::NAMES.join(", ")
                ),
            ));
        }

        let sn = &self.sensor;
        for (field, p) in [
            ("sensor.dropout_prob", sn.dropout_prob),
            ("sensor.missing_value_prob", sn.missing_value_prob),
            ("sensor.negative_wind_prob", sn.negative_wind_prob),
            ("sensor.power_spike_prob", sn.power_spike_prob),
            ("sensor.duplicate_prob", sn.duplicate_prob),
            ("sensor.degraded_prob", sn.degraded_prob),
            ("sensor.fault_prob", sn.fault_prob),
        ] {
            check_prob(&mut errors, field, p);
        }
        if sn.missing_value_prob + sn.negative_wind_prob + sn.power_spike_prob > 1.0 {
            errors.push(ConfigError::new(
                "sensor.missing_value_prob",
                "measurement defect probabilities must sum to <= 1.0",
            ));
        }
        if sn.degraded_prob + sn.fault_prob > 1.0 {
            errors.push(ConfigError::new(
                "sensor.degraded_prob",
                "degraded_prob + fault_prob must be <= 1.0",
            ));
        }

        errors
    }
}

/// Data-quality thresholds applied by the Silver stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Lowest physical wind speed (m/s).
    pub wind_speed_min_mps: f64,
    /// Highest physical wind speed (m/s).
    pub wind_speed_max_mps: f64,
    /// Lowest wind direction (degrees).
    pub wind_dir_min_deg: f64,
    /// Highest wind direction (degrees).
    pub wind_dir_max_deg: f64,
    /// Lowest plausible power (kW).
    pub power_min_kw: f64,
    /// Highest plausible power (kW).
    pub power_max_kw: f64,
    /// Lowest plausible rotor speed (rpm).
    pub rotor_speed_min_rpm: f64,
    /// Highest plausible rotor speed (rpm).
    pub rotor_speed_max_rpm: f64,
    /// Lowest yaw angle (degrees).
    pub yaw_min_deg: f64,
    /// Highest yaw angle (degrees).
    pub yaw_max_deg: f64,
    /// Slack beyond the run's tick length before consecutive samples of one
    /// turbine count as a gap (s).
    pub gap_tolerance_seconds: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            wind_speed_min_mps: 0.0,
            wind_speed_max_mps: 60.0,
            wind_dir_min_deg: 0.0,
            wind_dir_max_deg: 360.0,
            power_min_kw: 0.0,
            power_max_kw: 10_000.0,
            rotor_speed_min_rpm: 0.0,
            rotor_speed_max_rpm: 30.0,
            yaw_min_deg: 0.0,
            yaw_max_deg: 360.0,
            gap_tolerance_seconds: 5,
        }
    }
}

/// Pipeline configuration: data lake location, parallelism, thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the data lake.
    pub data_lake: PathBuf,
    /// Partition workers per stage invocation (1 = sequential).
    pub workers: usize,
    /// Silver quality thresholds.
    pub quality: QualityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_lake: PathBuf::from("data_lake"),
            workers: 1,
            quality: QualityConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses a pipeline configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("pipeline", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a pipeline configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.workers == 0 {
            errors.push(ConfigError::new("workers", "must be > 0"));
        }
        let q = &self.quality;
        if !(q.wind_speed_min_mps < q.wind_speed_max_mps) {
            errors.push(ConfigError::new(
                "quality.wind_speed_min_mps",
                "must be < quality.wind_speed_max_mps",
            ));
        }
        if !(q.wind_dir_min_deg < q.wind_dir_max_deg) {
            errors.push(ConfigError::new(
                "quality.wind_dir_min_deg",
                "must be < quality.wind_dir_max_deg",
            ));
        }
        if !(q.power_min_kw < q.power_max_kw) {
            errors.push(ConfigError::new("quality.power_min_kw", "must be < quality.power_max_kw"));
        }
        if !(q.rotor_speed_min_rpm < q.rotor_speed_max_rpm) {
            errors.push(ConfigError::new(
                "quality.rotor_speed_min_rpm",
                "must be < quality.rotor_speed_max_rpm",
            ));
        }
        if !(q.yaw_min_deg < q.yaw_max_deg) {
            errors.push(ConfigError::new("quality.yaw_min_deg", "must be < quality.yaw_max_deg"));
        }
        if q.gap_tolerance_seconds == 0 {
            errors.push(ConfigError::new("quality.gap_tolerance_seconds", "must be > 0"));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        let errors = ScenarioConfig::default().validate();
        assert!(errors.is_empty(), "default should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.err().map(|e| e.message).unwrap_or_default();
        assert!(e.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn presets_differ_only_in_identity_and_wake() {
        let a = ScenarioConfig::no_wake();
        let b = ScenarioConfig::wake();
        assert_eq!(a.scenario.sim_run_id, "SIM-A");
        assert_eq!(b.scenario.sim_run_id, "SIM-B");
        assert_eq!(a.wake.model, "none");
        assert_eq!(b.wake.model, "gaussian");
        assert_eq!(a.scenario.wind_seed, b.scenario.wind_seed);
        assert_eq!(a.scenario.telemetry_seed, b.scenario.telemetry_seed);
        assert_eq!(a.farm.rows * a.farm.cols, b.farm.rows * b.farm.cols);
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[scenario]
sim_run_id = "SIM-X"
start = "2024-03-01T00:00:00Z"
duration_hours = 2
tick_seconds = 60
rerun_policy = "overwrite"

[farm]
farm_id = "F9"
turbines = [
    { id = "WTG01", x_m = 0.0, y_m = 0.0 },
    { id = "WTG02", x_m = 700.0, y_m = 0.0 },
]

[turbine]
curve = "table"
table = [[3.0, 0.0], [8.0, 900.0], [12.0, 2000.0]]

[wake]
model = "jensen"
combination = "linear"

[sensor]
enabled = false
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.scenario.tick_seconds), Some(60));
        assert_eq!(cfg.as_ref().map(|c| c.farm.turbines.len()), Some(2));
        assert_eq!(cfg.as_ref().map(|c| &*c.wake.model), Some("jensen"));
        let errors = cfg.map(|c| c.validate()).unwrap_or_default();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[scenario]
tick_seconds = 10
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[scenario]
wind_seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).ok();
        assert_eq!(cfg.as_ref().map(|c| c.scenario.wind_seed), Some(99));
        assert_eq!(cfg.as_ref().map(|c| c.scenario.tick_seconds), Some(10));
        assert_eq!(cfg.as_ref().map(|c| c.turbine.rated_power_kw), Some(2000.0));
    }

    #[test]
    fn validation_catches_tick_not_dividing_hour() {
        let mut cfg = ScenarioConfig::default();
        cfg.scenario.tick_seconds = 7;
        assert!(cfg.validate().iter().any(|e| e.field == "scenario.tick_seconds"));
    }

    #[test]
    fn validation_catches_path_unsafe_ids() {
        let mut cfg = ScenarioConfig::default();
        cfg.scenario.sim_run_id = "a/b".to_string();
        cfg.farm.farm_id = "_hidden".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "scenario.sim_run_id"));
        assert!(errors.iter().any(|e| e.field == "farm.farm_id"));
    }

    #[test]
    fn validation_catches_inverted_curve_speeds() {
        let mut cfg = ScenarioConfig::default();
        cfg.turbine.cut_in_mps = 13.0;
        assert!(cfg.validate().iter().any(|e| e.field == "turbine.cut_in_mps"));
    }

    #[test]
    fn validation_catches_non_monotone_table() {
        let mut cfg = ScenarioConfig::default();
        cfg.turbine.curve = "table".to_string();
        cfg.turbine.table = vec![[3.0, 500.0], [8.0, 100.0]];
        assert!(cfg.validate().iter().any(|e| e.field == "turbine.table"));
    }

    #[test]
    fn validation_reports_every_error() {
        let mut cfg = ScenarioConfig::default();
        cfg.scenario.start = "yesterday".to_string();
        cfg.wake.model = "bogus".to_string();
        cfg.wake.combination = "rss".to_string();
        cfg.sensor.fault_prob = 1.5;
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        for f in ["scenario.start", "wake.model", "wake.combination", "sensor.fault_prob"] {
            assert!(fields.iter().any(|x| x == f), "missing {f} in {fields:?}");
        }
    }

    #[test]
    fn duplicate_explicit_ids_rejected() {
        let mut cfg = ScenarioConfig::default();
        cfg.farm.turbines = vec![
            TurbinePosition { id: "A".into(), x_m: 0.0, y_m: 0.0 },
            TurbinePosition { id: "A".into(), x_m: 1.0, y_m: 0.0 },
        ];
        assert!(cfg.validate().iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn pipeline_defaults_and_overrides() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.quality.wind_speed_max_mps, 60.0);
        assert_eq!(cfg.quality.gap_tolerance_seconds, 5);
        assert_eq!(cfg.quality.rotor_speed_max_rpm, 30.0);

        let parsed = PipelineConfig::from_toml_str(
            r#"
workers = 4
[quality]
power_max_kw = 2500.0
"#,
        )
        .ok();
        assert_eq!(parsed.as_ref().map(|c| c.workers), Some(4));
        assert_eq!(parsed.as_ref().map(|c| c.quality.power_max_kw), Some(2500.0));
        assert_eq!(parsed.map(|c| c.quality.wind_speed_max_mps), Some(60.0));
    }

    #[test]
    fn pipeline_rejects_zero_workers() {
        let cfg = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().iter().any(|e| e.field == "workers"));
    }
}
