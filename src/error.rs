//! Error type shared by the simulation, storage, and pipeline layers.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every failure the twin can surface.
///
/// Per-partition failures are isolated by the stage runner; only
/// [`ErrorKind::is_fatal`] kinds abort an invocation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// One or more configuration fields failed validation.
    #[error("configuration error: {}", join_config_errors(.0))]
    Configuration(Vec<ConfigError>),
    /// A scenario run was re-submitted under the `reject` rerun policy.
    #[error("scenario run `{0}` already exists (rerun_policy = \"reject\")")]
    RunExists(String),
    /// A scenario run has no manifest, so its partitions cannot be cleaned or aggregated.
    #[error("no manifest for scenario run `{0}`")]
    MissingRunManifest(String),
    /// A source partition could not be read or decoded.
    #[error("source partition {partition} is corrupt: {reason}")]
    SourcePartitionCorrupt {
        /// Rendered partition path.
        partition: String,
        /// Decoder or validation message.
        reason: String,
    },
    /// A partition or data file does not exist.
    #[error("partition {0} not found")]
    NotFound(String),
    /// The watermark for a processed partition could not be persisted.
    #[error("state commit failed for {stage}|{partition}: {reason}")]
    StateCommitFailure {
        /// Stage name.
        stage: String,
        /// Rendered partition path.
        partition: String,
        /// Underlying cause.
        reason: String,
    },
    /// The state store could not be loaded at all.
    #[error("state store unavailable: {0}")]
    StateUnavailable(String),
    /// The wake model produced a physically impossible wind speed.
    #[error(
        "wake model diverged for ({sim_run_id}, {turbine_id}, {timestamp}): \
         effective wind speed {effective_wind_speed}"
    )]
    WakeModelDivergence {
        /// Scenario run identifier.
        sim_run_id: String,
        /// Turbine whose effective speed diverged.
        turbine_id: String,
        /// Tick timestamp.
        timestamp: DateTime<Utc>,
        /// The offending computed value.
        effective_wind_speed: f64,
    },
    /// Another worker holds the partition's advisory lock.
    #[error("partition {0} is locked by another worker")]
    PartitionLocked(String),
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Parquet or Arrow encoding/decoding error.
    #[error("parquet error: {0}")]
    Parquet(String),
    /// JSON (state file, run manifest) error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<parquet::errors::ParquetError> for PipelineError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Self::Parquet(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for PipelineError {
    fn from(err: arrow::error::ArrowError) -> Self {
        Self::Parquet(err.to_string())
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(vec![err])
    }
}

impl PipelineError {
    /// Classifies the error for run summaries and exit codes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::RunExists(_) => ErrorKind::Configuration,
            Self::SourcePartitionCorrupt { .. } | Self::NotFound(_) | Self::MissingRunManifest(_) => {
                ErrorKind::SourcePartitionCorrupt
            }
            Self::StateCommitFailure { .. } => ErrorKind::StateCommitFailure,
            Self::StateUnavailable(_) => ErrorKind::StateUnavailable,
            Self::WakeModelDivergence { .. } => ErrorKind::WakeModelDivergence,
            Self::PartitionLocked(_) => ErrorKind::PartitionLocked,
            Self::Io(_) | Self::Parquet(_) | Self::Json(_) => ErrorKind::Storage,
        }
    }

    /// Wraps a decode failure of `partition` as [`PipelineError::SourcePartitionCorrupt`].
    pub fn corrupt(partition: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::SourcePartitionCorrupt {
            partition: partition.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error classification used for end-of-run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Invalid scenario/farm/pipeline parameters.
    Configuration,
    /// Unreadable or malformed input partition.
    SourcePartitionCorrupt,
    /// Unexpected or missing columns (recorded, never fatal).
    SchemaMismatch,
    /// Watermark could not be made durable.
    StateCommitFailure,
    /// State store could not be loaded.
    StateUnavailable,
    /// Physically impossible wake result.
    WakeModelDivergence,
    /// Partition lock held elsewhere.
    PartitionLocked,
    /// Output write or other I/O failure.
    Storage,
}

impl ErrorKind {
    /// Whether this kind aborts the whole stage invocation.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Configuration | Self::StateUnavailable)
    }

    /// Stable snake_case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::SourcePartitionCorrupt => "source_partition_corrupt",
            Self::SchemaMismatch => "schema_mismatch",
            Self::StateCommitFailure => "state_commit_failure",
            Self::StateUnavailable => "state_unavailable",
            Self::WakeModelDivergence => "wake_model_divergence",
            Self::PartitionLocked => "partition_locked",
            Self::Storage => "storage_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_fatal() {
        let err = PipelineError::from(ConfigError::new("scenario.tick_seconds", "must be > 0"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.kind().is_fatal());
        assert!(err.to_string().contains("scenario.tick_seconds"));
    }

    #[test]
    fn partition_errors_are_isolated() {
        let err = PipelineError::corrupt("sim_run_id=A/farm_id=F/date=2024-01-01/hour=00", "bad");
        assert_eq!(err.kind(), ErrorKind::SourcePartitionCorrupt);
        assert!(!err.kind().is_fatal());
        assert!(!ErrorKind::StateCommitFailure.is_fatal());
    }

    #[test]
    fn divergence_message_names_the_triple() {
        let err = PipelineError::WakeModelDivergence {
            sim_run_id: "SIM-B".into(),
            turbine_id: "T007".into(),
            timestamp: DateTime::from_timestamp(0, 0).unwrap_or_default(),
            effective_wind_speed: -0.4,
        };
        let msg = err.to_string();
        assert!(msg.contains("SIM-B"));
        assert!(msg.contains("T007"));
        assert!(msg.contains("1970-01-01"));
    }
}
