//! Scenario comparison over Gold farm KPIs.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::records::FarmKpiRecord;
use crate::store::{Layer, PartitionFilter, PartitionedStore};

/// Totals of one scenario run across its Gold hours.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTotals {
    /// Scenario run.
    pub sim_run_id: String,
    /// Farm hours aggregated.
    pub hours: usize,
    /// Farm energy (kWh).
    pub total_energy_kwh: f64,
    /// Power curve energy on ambient wind over the wake-loss sample set (kWh).
    pub no_wake_energy_kwh: f64,
    /// Mean hourly capacity factor.
    pub mean_capacity_factor: f64,
    /// Mean hourly availability.
    pub mean_availability: f64,
    /// Hourly wake loss weighted by no-wake energy, as a fraction.
    pub wake_loss_pct: f64,
    /// Mean hourly data quality score.
    pub mean_data_quality: f64,
    /// Mean hourly wind speed deficit (m/s).
    pub mean_wake_deficit_mps: f64,
}

/// Per-run totals, ordered by `sim_run_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonReport {
    /// One entry per scenario run.
    pub runs: Vec<RunTotals>,
}

impl ComparisonReport {
    /// Builds the report from farm KPI rows of any number of runs.
    pub fn from_kpis(rows: &[FarmKpiRecord]) -> Self {
        let mut grouped: BTreeMap<&str, Vec<&FarmKpiRecord>> = BTreeMap::new();
        for r in rows {
            grouped.entry(r.sim_run_id.as_str()).or_default().push(r);
        }
        let runs = grouped
            .into_iter()
            .map(|(id, hours)| {
                let n = hours.len() as f64;
                let mean = |f: fn(&FarmKpiRecord) -> f64| hours.iter().map(|h| f(h)).sum::<f64>() / n;
                let no_wake: f64 = hours.iter().map(|h| h.no_wake_energy_kwh).sum();
                let weighted: f64 = hours.iter().map(|h| h.wake_loss_pct * h.no_wake_energy_kwh).sum();
                RunTotals {
                    sim_run_id: id.to_string(),
                    hours: hours.len(),
                    total_energy_kwh: hours.iter().map(|h| h.total_energy_kwh).sum(),
                    no_wake_energy_kwh: no_wake,
                    mean_capacity_factor: mean(|h| h.capacity_factor),
                    mean_availability: mean(|h| h.availability),
                    wake_loss_pct: if no_wake > 0.0 { weighted / no_wake } else { 0.0 },
                    mean_data_quality: mean(|h| h.data_quality_score),
                    mean_wake_deficit_mps: mean(|h| h.avg_wake_loss_mps),
                }
            })
            .collect();
        Self { runs }
    }

    /// Reads Gold farm KPIs matching `filter` and builds the report.
    ///
    /// # Errors
    ///
    /// Returns a listing or decoding error.
    pub fn load(store: &PartitionedStore, filter: &PartitionFilter) -> Result<Self> {
        Ok(Self::from_kpis(&store.read_all::<FarmKpiRecord>(Layer::Gold, filter)?))
    }

    /// Totals of one run.
    pub fn run(&self, sim_run_id: &str) -> Option<&RunTotals> {
        self.runs.iter().find(|r| r.sim_run_id == sim_run_id)
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Scenario Comparison ---")?;
        writeln!(
            f,
            "{:<12} {:>6} {:>14} {:>14} {:>8} {:>8} {:>10} {:>9} {:>8}",
            "sim_run_id", "hours", "energy_kwh", "no_wake_kwh", "cf", "avail", "wake_loss", "deficit", "quality"
        )?;
        for r in &self.runs {
            writeln!(
                f,
                "{:<12} {:>6} {:>14.1} {:>14.1} {:>8.3} {:>8.3} {:>9.2}% {:>5.2} m/s {:>8.3}",
                r.sim_run_id,
                r.hours,
                r.total_energy_kwh,
                r.no_wake_energy_kwh,
                r.mean_capacity_factor,
                r.mean_availability,
                r.wake_loss_pct * 100.0,
                r.mean_wake_deficit_mps,
                r.mean_data_quality
            )?;
        }
        if self.runs.is_empty() {
            write!(f, "(no Gold partitions)")?;
        }
        Ok(())
    }
}
