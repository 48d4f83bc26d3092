//! Structured partition keys and their hive-style path rendering.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Timelike, Utc};

/// Lake layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Raw telemetry.
    Bronze,
    /// Cleaned telemetry.
    Silver,
    /// Aggregates.
    Gold,
}

impl Layer {
    /// Directory name under the lake root.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition identity: one scenario run, farm, UTC date and hour.
///
/// Field order gives the derived `Ord`, which matches lexicographic order of
/// the rendered path and chronological order within a run and farm.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    /// Scenario run.
    pub sim_run_id: String,
    /// Farm.
    pub farm_id: String,
    /// UTC date.
    pub date: NaiveDate,
    /// UTC hour, 0-23.
    pub hour: u8,
}

impl PartitionKey {
    /// Creates a key.
    pub fn new(sim_run_id: &str, farm_id: &str, date: NaiveDate, hour: u8) -> Self {
        Self {
            sim_run_id: sim_run_id.to_string(),
            farm_id: farm_id.to_string(),
            date,
            hour,
        }
    }

    /// Key of the hour containing `ts`.
    pub fn for_timestamp(sim_run_id: &str, farm_id: &str, ts: DateTime<Utc>) -> Self {
        // hour() is always < 24
        Self::new(sim_run_id, farm_id, ts.date_naive(), ts.hour() as u8)
    }

    /// First instant of the partition's hour.
    pub fn hour_start(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(u32::from(self.hour), 0, 0)
            .unwrap_or_default()
            .and_utc()
    }

    /// Whether `ts` falls inside this partition's hour.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts.date_naive() == self.date && ts.hour() == u32::from(self.hour)
    }

    /// Relative directory of the partition under a layer root.
    pub fn relative_path(&self) -> PathBuf {
        self.segments().iter().collect()
    }

    fn segments(&self) -> [String; 4] {
        [
            format!("sim_run_id={}", self.sim_run_id),
            format!("farm_id={}", self.farm_id),
            format!("date={}", self.date.format("%Y-%m-%d")),
            format!("hour={:02}", self.hour),
        ]
    }

    /// Parses the four `name=value` path segments in order.
    pub fn from_segments(segments: [&str; 4]) -> Option<Self> {
        let [run, farm, date, hour] = segments;
        let sim_run_id = run.strip_prefix("sim_run_id=").filter(|v| !v.is_empty())?;
        let farm_id = farm.strip_prefix("farm_id=").filter(|v| !v.is_empty())?;
        let date = NaiveDate::parse_from_str(date.strip_prefix("date=")?, "%Y-%m-%d").ok()?;
        let hour: u8 = hour.strip_prefix("hour=")?.parse().ok()?;
        if hour > 23 {
            return None;
        }
        Some(Self::new(sim_run_id, farm_id, date, hour))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

/// Error parsing a rendered partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyError(pub String);

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid partition key \"{}\"", self.0)
    }
}

impl std::error::Error for ParseKeyError {}

impl FromStr for PartitionKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let segments: [&str; 4] = parts
            .try_into()
            .map_err(|_| ParseKeyError(s.to_string()))?;
        Self::from_segments(segments).ok_or_else(|| ParseKeyError(s.to_string()))
    }
}

/// Prefix/range filter over partition keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionFilter {
    /// Only this scenario run.
    pub sim_run_id: Option<String>,
    /// Only this farm.
    pub farm_id: Option<String>,
    /// Earliest date, inclusive.
    pub date_from: Option<NaiveDate>,
    /// Latest date, inclusive.
    pub date_to: Option<NaiveDate>,
}

impl PartitionFilter {
    /// Matches every partition.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches one scenario run.
    pub fn run(sim_run_id: &str) -> Self {
        Self {
            sim_run_id: Some(sim_run_id.to_string()),
            ..Self::default()
        }
    }

    /// Whether a `sim_run_id` directory can contain matches.
    pub fn admits_run(&self, sim_run_id: &str) -> bool {
        self.sim_run_id.as_deref().is_none_or(|r| r == sim_run_id)
    }

    /// Whether a `farm_id` directory can contain matches.
    pub fn admits_farm(&self, farm_id: &str) -> bool {
        self.farm_id.as_deref().is_none_or(|f| f == farm_id)
    }

    /// Whether a date directory can contain matches.
    pub fn admits_date(&self, date: NaiveDate) -> bool {
        self.date_from.is_none_or(|from| date >= from) && self.date_to.is_none_or(|to| date <= to)
    }

    /// Whether `key` matches.
    pub fn matches(&self, key: &PartitionKey) -> bool {
        self.admits_run(&key.sim_run_id) && self.admits_farm(&key.farm_id) && self.admits_date(key.date)
    }
}
