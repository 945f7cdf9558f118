//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing or converting media files.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// External tool binary not found or not runnable.
    #[error("Converter tool not available: {tool}")]
    ToolNotFound { tool: String },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Probe process failed or produced unusable output.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// No capture timestamp could be extracted from the file's metadata.
    #[error("No capture time found in metadata of {path}")]
    CaptureTimeMissing { path: PathBuf },

    /// Conversion process failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Failed to parse tool output.
    #[error("Failed to parse tool output: {reason}")]
    ParseError { reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }
}
