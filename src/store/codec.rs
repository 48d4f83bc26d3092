//! Parquet encoding and decoding of the per-layer tables.
//!
//! Every table has a fixed Arrow schema. Decoding is tolerant of schema
//! evolution:
//! - identity columns are required; their absence makes the partition corrupt
//! - any other missing column reads as null (or its documented default)
//! - a column of another type is cast when possible and reported as drift
//! - an uncastable or unexpected column is ignored and reported as drift

use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMillisecondArray,
    UInt8Array, UInt32Array, UInt64Array,
};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::{PipelineError, Result};
use crate::models::TurbineStatus;
use crate::records::{
    CleanedRecord, FarmKpiRecord, HourlyEnergyRecord, RawTelemetryRecord, SensorQualityCode,
    parse_flags, render_flags,
};

/// A column that did not match the table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDrift {
    /// Column name.
    pub column: String,
    /// What differed.
    pub detail: String,
}

/// Rows decoded from one partition file plus any schema drift observed.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    /// Decoded rows in file order.
    pub rows: Vec<T>,
    /// Drift found while decoding; empty for a conforming file.
    pub drift: Vec<SchemaDrift>,
}

/// A record type stored as one Parquet file per partition.
pub trait PartitionTable: Sized {
    /// File name inside the partition directory.
    const FILE_NAME: &'static str;

    /// Canonical Arrow schema.
    fn schema() -> SchemaRef;

    /// Builds a record batch in the canonical schema.
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;

    /// Reads rows from normalised columns.
    fn from_columns(cols: &mut Columns) -> Result<Vec<Self>>;
}

/// Encodes rows to Parquet bytes.
///
/// # Errors
///
/// Returns an error if Arrow or Parquet serialization fails.
pub fn encode<T: PartitionTable>(rows: &[T]) -> Result<Bytes> {
    let batch = T::to_batch(rows)?;
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, T::schema(), Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Decodes Parquet bytes of `partition`.
///
/// # Errors
///
/// Returns [`PipelineError::SourcePartitionCorrupt`] if the bytes are not
/// Parquet or a required column is missing or unusable.
pub fn decode<T: PartitionTable>(bytes: &Bytes, partition: &str) -> Result<Decoded<T>> {
    let corrupt = |e: &dyn std::fmt::Display| PipelineError::corrupt(partition, e);
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone()).map_err(|e| corrupt(&e))?;
    let file_schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| corrupt(&e))?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(|e| corrupt(&e))?);
    }
    let batch = concat_batches(&file_schema, &batches).map_err(|e| corrupt(&e))?;

    let expected = T::schema();
    let mut cols = Columns {
        batch,
        expected,
        partition: partition.to_string(),
        drift: Vec::new(),
    };
    cols.report_unexpected();
    let rows = T::from_columns(&mut cols)?;
    Ok(Decoded {
        rows,
        drift: cols.drift,
    })
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("wind-farm-twin".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

fn utc_millis() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

/// Decoded columns of one file, normalised against a table schema.
pub struct Columns {
    batch: RecordBatch,
    expected: SchemaRef,
    partition: String,
    drift: Vec<SchemaDrift>,
}

impl Columns {
    /// Number of rows in the file.
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Records drift found by a table decoder.
    pub fn push_drift(&mut self, column: &str, detail: impl Into<String>) {
        self.drift.push(SchemaDrift {
            column: column.to_string(),
            detail: detail.into(),
        });
    }

    fn report_unexpected(&mut self) {
        let unexpected: Vec<String> = self
            .batch
            .schema()
            .fields()
            .iter()
            .filter(|f| self.expected.index_of(f.name()).is_err())
            .map(|f| f.name().clone())
            .collect();
        for name in unexpected {
            self.push_drift(&name, "unexpected column");
        }
    }

    /// Column `name` in its canonical type, or `None` if absent or uncastable.
    fn column(&mut self, name: &str) -> Option<ArrayRef> {
        let target = self
            .expected
            .field_with_name(name)
            .map(|f| f.data_type().clone())
            .ok()?;
        let idx = self.batch.schema().index_of(name).ok()?;
        let array = self.batch.column(idx).clone();
        if array.data_type() == &target {
            return Some(array);
        }
        let found = array.data_type().clone();
        match cast(&array, &target) {
            Ok(converted) => {
                self.push_drift(name, format!("type {found} cast to {target}"));
                Some(converted)
            }
            Err(e) => {
                self.push_drift(name, format!("type {found} not castable to {target}: {e}"));
                None
            }
        }
    }

    fn required(&mut self, name: &str) -> Result<ArrayRef> {
        let array = self.column(name).ok_or_else(|| {
            PipelineError::corrupt(&self.partition, format!("missing required column '{name}'"))
        })?;
        if array.null_count() > 0 {
            return Err(PipelineError::corrupt(
                &self.partition,
                format!("required column '{name}' contains nulls"),
            ));
        }
        Ok(array)
    }

    /// Required Utf8 column values.
    pub fn required_strings(&mut self, name: &str) -> Result<Vec<String>> {
        let array = self.required(name)?;
        let a = downcast::<StringArray>(&array, name, &self.partition)?;
        Ok(a.iter().map(|v| v.unwrap_or_default().to_string()).collect())
    }

    /// Required UTC millisecond timestamps.
    pub fn required_timestamps(&mut self, name: &str) -> Result<Vec<DateTime<Utc>>> {
        let array = self.required(name)?;
        let a = downcast::<TimestampMillisecondArray>(&array, name, &self.partition)?;
        a.values()
            .iter()
            .map(|&ms| {
                DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                    PipelineError::corrupt(&self.partition, format!("timestamp {ms} out of range"))
                })
            })
            .collect()
    }

    /// Required `YYYY-MM-DD` dates.
    pub fn required_dates(&mut self, name: &str) -> Result<Vec<NaiveDate>> {
        self.required_strings(name)?
            .iter()
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
                    PipelineError::corrupt(&self.partition, format!("bad date '{s}': {e}"))
                })
            })
            .collect()
    }

    /// Required UInt8 values.
    pub fn required_u8(&mut self, name: &str) -> Result<Vec<u8>> {
        let array = self.required(name)?;
        let a = downcast::<UInt8Array>(&array, name, &self.partition)?;
        Ok(a.values().to_vec())
    }

    /// Nullable Float64 values; a missing column is all null.
    pub fn optional_f64(&mut self, name: &str) -> Vec<Option<f64>> {
        let n = self.num_rows();
        match self.column(name) {
            Some(array) => match array.as_any().downcast_ref::<Float64Array>() {
                Some(a) => a.iter().collect(),
                None => vec![None; n],
            },
            None => vec![None; n],
        }
    }

    /// Nullable UInt32 values; a missing column is all null.
    pub fn optional_u32(&mut self, name: &str) -> Vec<Option<u32>> {
        let n = self.num_rows();
        match self.column(name) {
            Some(array) => match array.as_any().downcast_ref::<UInt32Array>() {
                Some(a) => a.iter().collect(),
                None => vec![None; n],
            },
            None => vec![None; n],
        }
    }

    /// Nullable UInt64 values; a missing column is all null.
    pub fn optional_u64(&mut self, name: &str) -> Vec<Option<u64>> {
        let n = self.num_rows();
        match self.column(name) {
            Some(array) => match array.as_any().downcast_ref::<UInt64Array>() {
                Some(a) => a.iter().collect(),
                None => vec![None; n],
            },
            None => vec![None; n],
        }
    }

    /// Nullable Utf8 values; a missing column is all null.
    pub fn optional_strings(&mut self, name: &str) -> Vec<Option<String>> {
        let n = self.num_rows();
        match self.column(name) {
            Some(array) => match array.as_any().downcast_ref::<StringArray>() {
                Some(a) => a.iter().map(|v| v.map(str::to_string)).collect(),
                None => vec![None; n],
            },
            None => vec![None; n],
        }
    }

    /// Nullable Boolean values; a missing column is all null.
    pub fn optional_bool(&mut self, name: &str) -> Vec<Option<bool>> {
        let n = self.num_rows();
        match self.column(name) {
            Some(array) => match array.as_any().downcast_ref::<BooleanArray>() {
                Some(a) => a.iter().collect(),
                None => vec![None; n],
            },
            None => vec![None; n],
        }
    }
}

fn downcast<'a, T: Array + 'static>(array: &'a ArrayRef, name: &str, partition: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| PipelineError::corrupt(partition, format!("column '{name}' has unexpected layout")))
}

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(values))
}

fn telemetry_fields() -> Vec<Field> {
    vec![
        Field::new("sim_run_id", DataType::Utf8, false),
        Field::new("farm_id", DataType::Utf8, false),
        Field::new("turbine_id", DataType::Utf8, false),
        Field::new("timestamp", utc_millis(), false),
        Field::new("ingest_seq", DataType::UInt64, false),
        Field::new("ambient_wind_speed", DataType::Float64, true),
        Field::new("ambient_wind_dir", DataType::Float64, true),
        Field::new("effective_wind_speed", DataType::Float64, true),
        Field::new("power_output", DataType::Float64, true),
        Field::new("rotor_speed_rpm", DataType::Float64, true),
        Field::new("yaw_deg", DataType::Float64, true),
        Field::new("turbine_status", DataType::Utf8, true),
        Field::new("sensor_quality_code", DataType::Utf8, false),
    ]
}

fn telemetry_columns<'a>(rows: impl Iterator<Item = &'a RawTelemetryRecord> + Clone) -> Vec<ArrayRef> {
    vec![
        strings(rows.clone().map(|r| r.sim_run_id.as_str())),
        strings(rows.clone().map(|r| r.farm_id.as_str())),
        strings(rows.clone().map(|r| r.turbine_id.as_str())),
        Arc::new(
            TimestampMillisecondArray::from_iter_values(
                rows.clone().map(|r| r.timestamp.timestamp_millis()),
            )
            .with_timezone("UTC"),
        ),
        Arc::new(UInt64Array::from_iter_values(rows.clone().map(|r| r.ingest_seq))),
        Arc::new(rows.clone().map(|r| r.ambient_wind_speed).collect::<Float64Array>()),
        Arc::new(rows.clone().map(|r| r.ambient_wind_dir).collect::<Float64Array>()),
        Arc::new(rows.clone().map(|r| r.effective_wind_speed).collect::<Float64Array>()),
        Arc::new(rows.clone().map(|r| r.power_output).collect::<Float64Array>()),
        Arc::new(rows.clone().map(|r| r.rotor_speed_rpm).collect::<Float64Array>()),
        Arc::new(rows.clone().map(|r| r.yaw_deg).collect::<Float64Array>()),
        Arc::new(
            rows.clone()
                .map(|r| r.turbine_status.map(TurbineStatus::as_str))
                .collect::<StringArray>(),
        ),
        strings(rows.map(|r| r.sensor_quality_code.as_str())),
    ]
}

fn telemetry_rows(cols: &mut Columns) -> Result<Vec<RawTelemetryRecord>> {
    let run = cols.required_strings("sim_run_id")?;
    let farm = cols.required_strings("farm_id")?;
    let turbine = cols.required_strings("turbine_id")?;
    let ts = cols.required_timestamps("timestamp")?;
    let seq = cols.optional_u64("ingest_seq");
    let ambient = cols.optional_f64("ambient_wind_speed");
    let dir = cols.optional_f64("ambient_wind_dir");
    let effective = cols.optional_f64("effective_wind_speed");
    let power = cols.optional_f64("power_output");
    let rotor = cols.optional_f64("rotor_speed_rpm");
    let yaw = cols.optional_f64("yaw_deg");
    let statuses = cols.optional_strings("turbine_status");
    let codes = cols.optional_strings("sensor_quality_code");

    let mut unknown_codes = BTreeSet::new();
    let mut unknown_statuses = BTreeSet::new();
    let mut rows = Vec::with_capacity(cols.num_rows());
    for i in 0..cols.num_rows() {
        let turbine_status = statuses[i].as_deref().and_then(|s| {
            let parsed = TurbineStatus::parse(s);
            if parsed.is_none() {
                unknown_statuses.insert(s.to_string());
            }
            parsed
        });
        let sensor_quality_code = match codes[i].as_deref() {
            None => SensorQualityCode::Good,
            Some(s) => SensorQualityCode::parse(s).unwrap_or_else(|| {
                unknown_codes.insert(s.to_string());
                SensorQualityCode::Fault
            }),
        };
        rows.push(RawTelemetryRecord {
            sim_run_id: run[i].clone(),
            farm_id: farm[i].clone(),
            turbine_id: turbine[i].clone(),
            timestamp: ts[i],
            ingest_seq: seq[i].unwrap_or(i as u64),
            ambient_wind_speed: ambient[i],
            ambient_wind_dir: dir[i],
            effective_wind_speed: effective[i],
            power_output: power[i],
            rotor_speed_rpm: rotor[i],
            yaw_deg: yaw[i],
            turbine_status,
            sensor_quality_code,
        });
    }
    for code in unknown_codes {
        cols.push_drift("sensor_quality_code", format!("unknown code '{code}' read as FAULT"));
    }
    for status in unknown_statuses {
        cols.push_drift("turbine_status", format!("unknown status '{status}' read as null"));
    }
    Ok(rows)
}

impl PartitionTable for RawTelemetryRecord {
    const FILE_NAME: &'static str = "telemetry.parquet";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(telemetry_fields()))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(Self::schema(), telemetry_columns(rows.iter()))?)
    }

    fn from_columns(cols: &mut Columns) -> Result<Vec<Self>> {
        telemetry_rows(cols)
    }
}

impl PartitionTable for CleanedRecord {
    const FILE_NAME: &'static str = "cleaned.parquet";

    fn schema() -> SchemaRef {
        let mut fields = telemetry_fields();
        fields.push(Field::new("quality_flags", DataType::Utf8, false));
        fields.push(Field::new("is_valid", DataType::Boolean, false));
        Arc::new(Schema::new(fields))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let mut columns = telemetry_columns(rows.iter().map(|r| &r.record));
        let flags: Vec<String> = rows.iter().map(|r| render_flags(&r.quality_flags)).collect();
        columns.push(strings(flags.iter().map(String::as_str)));
        columns.push(Arc::new(BooleanArray::from(
            rows.iter().map(|r| r.is_valid).collect::<Vec<_>>(),
        )));
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_columns(cols: &mut Columns) -> Result<Vec<Self>> {
        let raw = telemetry_rows(cols)?;
        let flags = cols.optional_strings("quality_flags");
        let valid = cols.optional_bool("is_valid");
        let mut unknown_flags = BTreeSet::new();
        let rows = raw
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let (quality_flags, unknown) = parse_flags(flags[i].as_deref().unwrap_or(""));
                unknown_flags.extend(unknown);
                CleanedRecord {
                    record,
                    quality_flags,
                    is_valid: valid[i].unwrap_or(false),
                }
            })
            .collect();
        for flag in unknown_flags {
            cols.push_drift("quality_flags", format!("unknown flag '{flag}' ignored"));
        }
        Ok(rows)
    }
}

impl PartitionTable for HourlyEnergyRecord {
    const FILE_NAME: &'static str = "hourly_energy.parquet";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("sim_run_id", DataType::Utf8, false),
            Field::new("farm_id", DataType::Utf8, false),
            Field::new("turbine_id", DataType::Utf8, false),
            Field::new("date", DataType::Utf8, false),
            Field::new("hour", DataType::UInt8, false),
            Field::new("energy_kwh", DataType::Float64, false),
            Field::new("valid_record_count", DataType::UInt32, false),
            Field::new("expected_record_count", DataType::UInt32, false),
            Field::new("wind_speed_mps_avg", DataType::Float64, false),
            Field::new("power_kw_avg", DataType::Float64, false),
            Field::new("downtime_minutes", DataType::Float64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let dates: Vec<String> = rows.iter().map(|r| r.date.format("%Y-%m-%d").to_string()).collect();
        let columns: Vec<ArrayRef> = vec![
            strings(rows.iter().map(|r| r.sim_run_id.as_str())),
            strings(rows.iter().map(|r| r.farm_id.as_str())),
            strings(rows.iter().map(|r| r.turbine_id.as_str())),
            strings(dates.iter().map(String::as_str)),
            Arc::new(UInt8Array::from_iter_values(rows.iter().map(|r| r.hour))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.energy_kwh))),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.valid_record_count))),
            Arc::new(UInt32Array::from_iter_values(
                rows.iter().map(|r| r.expected_record_count),
            )),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.wind_speed_mps_avg))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.power_kw_avg))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.downtime_minutes))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_columns(cols: &mut Columns) -> Result<Vec<Self>> {
        let run = cols.required_strings("sim_run_id")?;
        let farm = cols.required_strings("farm_id")?;
        let turbine = cols.required_strings("turbine_id")?;
        let date = cols.required_dates("date")?;
        let hour = cols.required_u8("hour")?;
        let energy = cols.optional_f64("energy_kwh");
        let valid = cols.optional_u32("valid_record_count");
        let expected = cols.optional_u32("expected_record_count");
        let wind_avg = cols.optional_f64("wind_speed_mps_avg");
        let power_avg = cols.optional_f64("power_kw_avg");
        let downtime = cols.optional_f64("downtime_minutes");
        Ok((0..cols.num_rows())
            .map(|i| HourlyEnergyRecord {
                sim_run_id: run[i].clone(),
                farm_id: farm[i].clone(),
                turbine_id: turbine[i].clone(),
                date: date[i],
                hour: hour[i],
                energy_kwh: energy[i].unwrap_or(0.0),
                valid_record_count: valid[i].unwrap_or(0),
                expected_record_count: expected[i].unwrap_or(0),
                wind_speed_mps_avg: wind_avg[i].unwrap_or(0.0),
                power_kw_avg: power_avg[i].unwrap_or(0.0),
                downtime_minutes: downtime[i].unwrap_or(0.0),
            })
            .collect())
    }
}

impl PartitionTable for FarmKpiRecord {
    const FILE_NAME: &'static str = "farm_kpi.parquet";

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("sim_run_id", DataType::Utf8, false),
            Field::new("farm_id", DataType::Utf8, false),
            Field::new("date", DataType::Utf8, false),
            Field::new("hour", DataType::UInt8, false),
            Field::new("total_energy_kwh", DataType::Float64, false),
            Field::new("capacity_factor", DataType::Float64, false),
            Field::new("availability", DataType::Float64, false),
            Field::new("wake_loss_pct", DataType::Float64, false),
            Field::new("data_quality_score", DataType::Float64, false),
            Field::new("turbine_count", DataType::UInt32, false),
            Field::new("no_wake_energy_kwh", DataType::Float64, false),
            Field::new("avg_wake_loss_mps", DataType::Float64, false),
            Field::new("bad_row_rate", DataType::Float64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let dates: Vec<String> = rows.iter().map(|r| r.date.format("%Y-%m-%d").to_string()).collect();
        let f64s = |f: fn(&FarmKpiRecord) -> f64| -> ArrayRef {
            Arc::new(Float64Array::from_iter_values(rows.iter().map(f)))
        };
        let columns: Vec<ArrayRef> = vec![
            strings(rows.iter().map(|r| r.sim_run_id.as_str())),
            strings(rows.iter().map(|r| r.farm_id.as_str())),
            strings(dates.iter().map(String::as_str)),
            Arc::new(UInt8Array::from_iter_values(rows.iter().map(|r| r.hour))),
            f64s(|r| r.total_energy_kwh),
            f64s(|r| r.capacity_factor),
            f64s(|r| r.availability),
            f64s(|r| r.wake_loss_pct),
            f64s(|r| r.data_quality_score),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.turbine_count))),
            f64s(|r| r.no_wake_energy_kwh),
            f64s(|r| r.avg_wake_loss_mps),
            f64s(|r| r.bad_row_rate),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_columns(cols: &mut Columns) -> Result<Vec<Self>> {
        let run = cols.required_strings("sim_run_id")?;
        let farm = cols.required_strings("farm_id")?;
        let date = cols.required_dates("date")?;
        let hour = cols.required_u8("hour")?;
        let total = cols.optional_f64("total_energy_kwh");
        let cf = cols.optional_f64("capacity_factor");
        let availability = cols.optional_f64("availability");
        let wake_loss = cols.optional_f64("wake_loss_pct");
        let dq = cols.optional_f64("data_quality_score");
        let count = cols.optional_u32("turbine_count");
        let no_wake = cols.optional_f64("no_wake_energy_kwh");
        let wake_mps = cols.optional_f64("avg_wake_loss_mps");
        let bad_rate = cols.optional_f64("bad_row_rate");
        Ok((0..cols.num_rows())
            .map(|i| FarmKpiRecord {
                sim_run_id: run[i].clone(),
                farm_id: farm[i].clone(),
                date: date[i],
                hour: hour[i],
                total_energy_kwh: total[i].unwrap_or(0.0),
                capacity_factor: cf[i].unwrap_or(0.0),
                availability: availability[i].unwrap_or(0.0),
                wake_loss_pct: wake_loss[i].unwrap_or(0.0),
                data_quality_score: dq[i].unwrap_or(0.0),
                turbine_count: count[i].unwrap_or(0),
                no_wake_energy_kwh: no_wake[i].unwrap_or(0.0),
                avg_wake_loss_mps: wake_mps[i].unwrap_or(0.0),
                bad_row_rate: bad_rate[i].unwrap_or(0.0),
            })
            .collect())
    }
}
