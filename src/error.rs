//! Error types for fatal, run-level failures.
//!
//! Per-file problems never show up here: checks turn them into issues.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that stop a health check run.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Dataset root is missing or is not a directory.
    #[error("dataset path not found or not a directory: {}", .0.display())]
    NotFound(PathBuf),

    /// Dataset root has no class subdirectories.
    #[error("dataset has no class folders: {}", .0.display())]
    EmptyDataset(PathBuf),

    /// The pipeline was used out of order (e.g. adding a check after a run).
    #[error("pipeline state error: {0}")]
    PipelineState(String),

    /// The run was cancelled before every check finished.
    #[error("health check run was cancelled")]
    Cancelled,

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside of per-file check work.
    #[error("I/O error: {0}")]
    Io(String),
}

impl HealthError {
    #[must_use]
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound(path.to_path_buf())
    }

    #[must_use]
    pub fn empty_dataset(path: &Path) -> Self {
        Self::EmptyDataset(path.to_path_buf())
    }

    #[must_use]
    pub fn pipeline_state(reason: impl Into<String>) -> Self {
        Self::PipelineState(reason.into())
    }

    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// True for errors caused by the dataset itself rather than by usage.
    pub fn is_dataset_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::EmptyDataset(_))
    }
}

impl From<std::io::Error> for HealthError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HealthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, HealthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mentions_path() {
        let err = HealthError::not_found(Path::new("/data/missing"));
        assert!(err.to_string().contains("/data/missing"));
        assert!(err.is_dataset_error());
    }

    #[test]
    fn test_pipeline_state_is_not_a_dataset_error() {
        let err = HealthError::pipeline_state("already ran");
        assert!(err.to_string().contains("already ran"));
        assert!(!err.is_dataset_error());
    }

    #[test]
    fn test_io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: HealthError = io_err.into();
        assert!(matches!(err, HealthError::Io(_)));
    }

    #[test]
    fn test_json_error_becomes_config_error() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: HealthError = json_err.into();
        assert!(matches!(err, HealthError::Config(_)));
    }
}
