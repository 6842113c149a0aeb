//! Crate-wide error type
//!
//! All failures in this crate happen while building resources or loading
//! configuration. Once a particle system exists its stages cannot fail.

use thiserror::Error;

/// Result alias used across the crate
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No compatible GPU adapter found")]
    AdapterNotFound,

    #[error("GPU device request failed: {0}")]
    DeviceRequest(String),

    #[error("GPU operation '{operation}' failed: {error}")]
    GpuOperationFailed { operation: String, error: String },

    #[error("Failed to map GPU buffer: {buffer}")]
    BufferMapping { buffer: String },

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Unknown configuration format for {path}")]
    UnknownConfigFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{component} error: {error}")]
    SystemError { component: String, error: String },
}
