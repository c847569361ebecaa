//! Error types for RoiView.

use thiserror::Error;

/// Main error type for RoiView operations.
#[derive(Error, Debug)]
pub enum RoiViewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Effect error: {0}")]
    Effect(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for RoiView operations.
pub type Result<T> = std::result::Result<T, RoiViewError>;
