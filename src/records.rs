//! Typed records of every lake layer.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::TurbineStatus;

/// Sensor health reported with each telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorQualityCode {
    /// Normal operation.
    #[default]
    Good,
    /// Degraded sensor; values kept but suspect.
    Degraded,
    /// Faulted sensor; values unusable.
    Fault,
}

impl SensorQualityCode {
    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Degraded => "DEGRADED",
            Self::Fault => "FAULT",
        }
    }

    /// Parses the stored representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GOOD" => Some(Self::Good),
            "DEGRADED" => Some(Self::Degraded),
            "FAULT" => Some(Self::Fault),
            _ => None,
        }
    }
}

/// Bronze: one raw sample per turbine per tick, as ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTelemetryRecord {
    /// Scenario run.
    pub sim_run_id: String,
    /// Farm.
    pub farm_id: String,
    /// Turbine.
    pub turbine_id: String,
    /// Tick timestamp.
    pub timestamp: DateTime<Utc>,
    /// Ingestion order within the run; later means newer.
    pub ingest_seq: u64,
    /// Pre-wake hub-height wind speed (m/s).
    pub ambient_wind_speed: Option<f64>,
    /// Ambient wind direction (degrees).
    pub ambient_wind_dir: Option<f64>,
    /// Post-wake wind speed as measured (m/s).
    pub effective_wind_speed: Option<f64>,
    /// Power as measured (kW).
    pub power_output: Option<f64>,
    /// Rotor speed as measured (rpm).
    pub rotor_speed_rpm: Option<f64>,
    /// Nacelle yaw angle (degrees).
    pub yaw_deg: Option<f64>,
    /// Controller state; absent in files written before it was recorded.
    pub turbine_status: Option<TurbineStatus>,
    /// Sensor health.
    pub sensor_quality_code: SensorQualityCode,
}

/// Data-quality flags attached by the Silver stage.
///
/// Variants are declared in alphabetical order so a `BTreeSet` renders sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityFlag {
    /// One or more duplicates of this key were dropped.
    DuplicateRemoved,
    /// A missing measurement was linearly interpolated, or samples before
    /// this one were lost in a time gap.
    MissingInterpolated,
    /// A measurement is missing and could not be interpolated.
    MissingValue,
    /// A measurement lies outside physical bounds.
    OutOfRange,
    /// The source partition's schema drifted.
    SchemaMismatch,
    /// Sensor reported DEGRADED.
    SensorDegraded,
    /// Sensor reported FAULT.
    SensorFault,
    /// Preceding sample of the turbine is further away than the gap tolerance.
    TimeGap,
}

impl QualityFlag {
    /// Every flag in rendering order.
    pub const ALL: [QualityFlag; 8] = [
        Self::DuplicateRemoved,
        Self::MissingInterpolated,
        Self::MissingValue,
        Self::OutOfRange,
        Self::SchemaMismatch,
        Self::SensorDegraded,
        Self::SensorFault,
        Self::TimeGap,
    ];

    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateRemoved => "DUPLICATE_REMOVED",
            Self::MissingInterpolated => "MISSING_INTERPOLATED",
            Self::MissingValue => "MISSING_VALUE",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::SensorDegraded => "SENSOR_DEGRADED",
            Self::SensorFault => "SENSOR_FAULT",
            Self::TimeGap => "TIME_GAP",
        }
    }

    /// Parses the stored representation.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    /// Whether the flag makes a record invalid for aggregation.
    pub fn invalidates(self) -> bool {
        matches!(self, Self::OutOfRange | Self::MissingValue | Self::SensorFault)
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a flag set as the stored comma-separated column value.
pub fn render_flags(flags: &BTreeSet<QualityFlag>) -> String {
    flags
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a stored flag column value; unknown codes are returned separately.
pub fn parse_flags(s: &str) -> (BTreeSet<QualityFlag>, Vec<String>) {
    let mut flags = BTreeSet::new();
    let mut unknown = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match QualityFlag::parse(part) {
            Some(f) => {
                flags.insert(f);
            }
            None => unknown.push(part.to_string()),
        }
    }
    (flags, unknown)
}

/// Silver: a deduplicated, quality-flagged telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    /// Surviving raw record, with interpolated values filled in.
    pub record: RawTelemetryRecord,
    /// Flags applied during cleaning.
    pub quality_flags: BTreeSet<QualityFlag>,
    /// No invalidating flag present.
    pub is_valid: bool,
}

impl CleanedRecord {
    /// Derives `is_valid` from the flag set.
    pub fn new(record: RawTelemetryRecord, quality_flags: BTreeSet<QualityFlag>) -> Self {
        let is_valid = !quality_flags.iter().any(|f| f.invalidates());
        Self {
            record,
            quality_flags,
            is_valid,
        }
    }
}

/// Gold: energy of one turbine over one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyEnergyRecord {
    /// Scenario run.
    pub sim_run_id: String,
    /// Farm.
    pub farm_id: String,
    /// Turbine.
    pub turbine_id: String,
    /// UTC date.
    pub date: NaiveDate,
    /// UTC hour, 0-23.
    pub hour: u8,
    /// Energy from valid samples (kWh).
    pub energy_kwh: f64,
    /// Valid samples, capped at `expected_record_count`.
    pub valid_record_count: u32,
    /// Ticks in the hour.
    pub expected_record_count: u32,
    /// Mean effective wind speed of valid samples (m/s).
    pub wind_speed_mps_avg: f64,
    /// Mean power of valid samples (kW).
    pub power_kw_avg: f64,
    /// Ticks reported as stopped or cut out, in minutes.
    pub downtime_minutes: f64,
}

/// Gold: farm KPIs over one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct FarmKpiRecord {
    /// Scenario run.
    pub sim_run_id: String,
    /// Farm.
    pub farm_id: String,
    /// UTC date.
    pub date: NaiveDate,
    /// UTC hour, 0-23.
    pub hour: u8,
    /// Sum of turbine energy (kWh).
    pub total_energy_kwh: f64,
    /// Energy over rated capacity for the hour.
    pub capacity_factor: f64,
    /// Valid over expected samples, farm-wide.
    pub availability: f64,
    /// `1 - actual / no_wake` energy, as a fraction.
    pub wake_loss_pct: f64,
    /// Unflagged valid records over cleaned records.
    pub data_quality_score: f64,
    /// Turbines in the run manifest.
    pub turbine_count: u32,
    /// Power curve energy on ambient wind over the wake-loss sample set (kWh).
    pub no_wake_energy_kwh: f64,
    /// Mean of ambient minus effective wind speed over valid samples (m/s).
    pub avg_wake_loss_mps: f64,
    /// Invalid records over cleaned records.
    pub bad_row_rate: f64,
}
