//! Error types for retina-sim

use thiserror::Error;

/// Retina simulator error type
#[derive(Debug, Error)]
pub enum RetinaError {
    /// Malformed script line; parsing stops here
    #[error("Incorrect syntax in line {line}: {message}")]
    Script { line: usize, message: String },

    /// Unknown parameter name or out-of-range value
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Unresolved source or target identifier
    #[error("Connection error: {0}")]
    Connection(String),

    /// Input media could not be opened or decoded
    #[error("Input error: {0}")]
    Input(String),

    /// Output sink could not be written
    #[error("Output error: {0}")]
    Output(String),

    /// Frame decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetinaError {
    /// Shorthand for a parameter error
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }

    /// True for errors raised while reading the script
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script { .. })
    }
}

pub type Result<T> = std::result::Result<T, RetinaError>;
