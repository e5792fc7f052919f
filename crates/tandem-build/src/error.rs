//! Unit coordination error types

use std::path::PathBuf;
use thiserror::Error;

pub type UnitResult<T> = Result<T, UnitError>;

/// Errors surfaced by unit coordination.
///
/// Every variant is cheap to clone: a failure observed by the caller that
/// actually executed the work function is handed verbatim to every caller
/// that coalesced on the same run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Target {target} is not declared by unit '{unit}'")]
    UndeclaredTarget { unit: String, target: PathBuf },

    #[error("Failed to read manifest at {path}: {error}")]
    ManifestReadError { path: PathBuf, error: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Stamp store error: {0}")]
    StampError(String),

    #[error("Failed to spawn work command for unit '{unit}': {error}")]
    WorkSpawnError { unit: String, error: String },

    #[error("Work command for unit '{unit}' exited with code {exit_code}: {output}")]
    WorkFailed {
        unit: String,
        exit_code: i32,
        output: String,
    },

    #[error("Work function for unit '{unit}' failed: {error}")]
    WorkError { unit: String, error: String },

    #[error("I/O error at {path}: {error}")]
    IoError { path: PathBuf, error: String },
}

impl UnitError {
    /// Create an invalid unit error
    pub fn invalid_unit(reason: impl Into<String>) -> Self {
        Self::InvalidUnit(reason.into())
    }

    /// Create an undeclared target error
    pub fn undeclared_target(unit: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self::UndeclaredTarget {
            unit: unit.into(),
            target: target.into(),
        }
    }

    /// Create a manifest read error
    pub fn manifest_read(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::ManifestReadError {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::IoError {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create a work spawn error
    pub fn work_spawn(unit: impl Into<String>, error: impl ToString) -> Self {
        Self::WorkSpawnError {
            unit: unit.into(),
            error: error.to_string(),
        }
    }

    /// Create a work failure from a command exit
    pub fn work_failed(unit: impl Into<String>, exit_code: i32, output: impl Into<String>) -> Self {
        Self::WorkFailed {
            unit: unit.into(),
            exit_code,
            output: output.into(),
        }
    }

    /// Create a work function error
    pub fn work(unit: impl Into<String>, error: impl ToString) -> Self {
        Self::WorkError {
            unit: unit.into(),
            error: error.to_string(),
        }
    }
}
