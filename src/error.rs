//! Error handling for MAPCO2 telemetry processing.
//!
//! Only failures that abort a stream live here. Field-level and frame-level
//! degradations are recorded in the parser's side log instead (see
//! [`crate::provenance`]).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Co2Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Input not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error(
        "Inconsistent transport dialect: {flash_frames} flash frames mixed with {summary_frames} summary frames"
    )]
    InconsistentDialect {
        flash_frames: usize,
        summary_frames: usize,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Processing cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid input pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl Co2Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a processing failure bound to a file
    pub fn processing_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ProcessingFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }
}

impl From<walkdir::Error> for Co2Error {
    fn from(error: walkdir::Error) -> Self {
        let path = error.path().map(|p| p.to_path_buf()).unwrap_or_default();
        Self::ProcessingFailed {
            path,
            reason: format!("directory traversal failed: {}", error),
        }
    }
}

pub type Result<T> = std::result::Result<T, Co2Error>;
