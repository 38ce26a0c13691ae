//! Error types for the lighting core
use thiserror::Error;

/// Core errors
///
/// Only parsing and configuration surface as errors. Membership failures are
/// reported as `bool`, and RDM failures travel through the completion
/// callback as an [`RdmStatusCode`](crate::rdm::RdmStatusCode).
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed RDM UID string
    #[error("Invalid UID: {0}")]
    InvalidUid(String),

    /// Malformed DMX slot list
    #[error("Invalid DMX data: {0}")]
    InvalidDmx(String),

    /// Unknown merge mode name
    #[error("Invalid merge mode: {0}")]
    InvalidMergeMode(String),

    /// Semantically invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
