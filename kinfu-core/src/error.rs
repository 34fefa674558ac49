//! Error types for kinfu-rs

use thiserror::Error;

/// Main error type for kinfu-rs operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Visualization error: {0}")]
    Visualization(String),

    #[error("Failed to open depth device: {0}")]
    DeviceOpen(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for kinfu-rs operations
pub type Result<T> = std::result::Result<T, Error>;
