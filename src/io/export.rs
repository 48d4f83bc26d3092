//! CSV export of Gold tables.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::records::{FarmKpiRecord, HourlyEnergyRecord};

/// Column header of the hourly energy export.
const HOURLY_HEADER: &str = "sim_run_id,farm_id,turbine_id,date,hour,\
                             energy_kwh,valid_record_count,expected_record_count,\
                             wind_speed_mps_avg,power_kw_avg,downtime_minutes";

/// Column header of the farm KPI export.
const KPI_HEADER: &str = "sim_run_id,farm_id,date,hour,total_energy_kwh,\
                          capacity_factor,availability,wake_loss_pct,\
                          data_quality_score,turbine_count,no_wake_energy_kwh,\
                          avg_wake_loss_mps,bad_row_rate";

/// Exports hourly energy rows to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_hourly_csv(rows: &[HourlyEnergyRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_hourly_csv(rows, io::BufWriter::new(file))
}

/// Exports farm KPI rows to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_kpi_csv(rows: &[FarmKpiRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_kpi_csv(rows, io::BufWriter::new(file))
}

/// Writes hourly energy rows as CSV to any writer.
///
/// # Arguments
///
/// * `rows` - Gold hourly energy rows, written in the given order
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_hourly_csv(rows: &[HourlyEnergyRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HOURLY_HEADER.split(',').map(str::trim))?;
    for r in rows {
        wtr.write_record(&[
            r.sim_run_id.clone(),
            r.farm_id.clone(),
            r.turbine_id.clone(),
            r.date.format("%Y-%m-%d").to_string(),
            r.hour.to_string(),
            format!("{:.4}", r.energy_kwh),
            r.valid_record_count.to_string(),
            r.expected_record_count.to_string(),
            format!("{:.4}", r.wind_speed_mps_avg),
            format!("{:.4}", r.power_kw_avg),
            format!("{:.2}", r.downtime_minutes),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes farm KPI rows as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_kpi_csv(rows: &[FarmKpiRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(KPI_HEADER.split(',').map(str::trim))?;
    for r in rows {
        wtr.write_record(&[
            r.sim_run_id.clone(),
            r.farm_id.clone(),
            r.date.format("%Y-%m-%d").to_string(),
            r.hour.to_string(),
            format!("{:.4}", r.total_energy_kwh),
            format!("{:.6}", r.capacity_factor),
            format!("{:.6}", r.availability),
            format!("{:.6}", r.wake_loss_pct),
            format!("{:.6}", r.data_quality_score),
            r.turbine_count.to_string(),
            format!("{:.4}", r.no_wake_energy_kwh),
            format!("{:.4}", r.avg_wake_loss_mps),
            format!("{:.6}", r.bad_row_rate),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hourly(hour: u8) -> HourlyEnergyRecord {
        HourlyEnergyRecord {
            sim_run_id: "SIM-A".into(),
            farm_id: "F001".into(),
            turbine_id: "T001".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            hour,
            energy_kwh: 812.5,
            valid_record_count: 358,
            expected_record_count: 360,
            wind_speed_mps_avg: 8.25,
            power_kw_avg: 816.5,
            downtime_minutes: 0.5,
        }
    }

    fn kpi() -> FarmKpiRecord {
        FarmKpiRecord {
            sim_run_id: "SIM-B".into(),
            farm_id: "F001".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            hour: 4,
            total_energy_kwh: 9000.0,
            capacity_factor: 0.375,
            availability: 0.99,
            wake_loss_pct: 0.08,
            data_quality_score: 0.97,
            turbine_count: 12,
            no_wake_energy_kwh: 9782.6,
            avg_wake_loss_mps: 0.61,
            bad_row_rate: 0.004,
        }
    }

    #[test]
    fn hourly_header_and_rows() {
        let mut buf = Vec::new();
        write_hourly_csv(&[hourly(0), hourly(1)], &mut buf).ok();
        let output = String::from_utf8(buf).unwrap_or_default();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines[0],
            "sim_run_id,farm_id,turbine_id,date,hour,energy_kwh,valid_record_count,expected_record_count,\
             wind_speed_mps_avg,power_kw_avg,downtime_minutes"
        );
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "SIM-A,F001,T001,2024-01-01,1,812.5000,358,360,8.2500,816.5000,0.50");
    }

    #[test]
    fn kpi_rows_parse_back() {
        let mut buf = Vec::new();
        write_kpi_csv(&[kpi()], &mut buf).ok();
        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        assert_eq!(rdr.headers().map(csv::StringRecord::len).ok(), Some(13));
        let rows: Vec<csv::StringRecord> = rdr.records().filter_map(|r| r.ok()).collect();
        assert_eq!(rows.len(), 1);
        let wake_loss: Option<f64> = rows[0].get(7).and_then(|v| v.parse().ok());
        assert_eq!(wake_loss, Some(0.08));
        let bad_rate: Option<f64> = rows[0].get(12).and_then(|v| v.parse().ok());
        assert_eq!(bad_rate, Some(0.004));
    }

    #[test]
    fn deterministic_output() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_kpi_csv(&[kpi()], &mut a).ok();
        write_kpi_csv(&[kpi()], &mut b).ok();
        assert_eq!(a, b);
    }
}
